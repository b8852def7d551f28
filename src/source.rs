//! Reading raw build specification text from its source

use crate::errors::SpecError;
use regex::Regex;
use std::path::PathBuf;

/// A location raw specification text can be read from
///
/// The variant is sniffed from a `scheme//rest` prefix. A value with no
/// scheme is a local file path, and an unrecognized scheme falls back to
/// the local file reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Http { scheme: String, rest: String },
}

impl Source {
    pub fn parse(value: &str) -> Source {
        lazy_static! {
            static ref RE: Regex = Regex::new("^([a-zA-Z]+)//(.*)$").unwrap();
        }
        match RE.captures(value) {
            Some(captures) => {
                let scheme = captures.get(1).unwrap().as_str();
                let rest = captures.get(2).unwrap().as_str();
                match scheme {
                    "http" | "https" => Source::Http {
                        scheme: scheme.to_owned(),
                        rest: rest.to_owned(),
                    },
                    _ => Source::File(PathBuf::from(rest)),
                }
            }
            None => Source::File(PathBuf::from(value)),
        }
    }

    /// Read the source's entire content as text
    pub async fn read(&self) -> Result<String, SpecError> {
        match self {
            Source::File(path) => Ok(tokio::fs::read_to_string(path).await?),
            Source::Http { scheme, rest } => {
                let url = format!("{}://{}", scheme, rest);
                let response = reqwest::get(&url).await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SpecError::Http {
                        url,
                        status: status.as_u16(),
                    });
                }
                Ok(response.text().await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new()
            .basic_scheduler()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn scheme_sniffing() {
        assert_eq!(
            Source::parse("Containerfile"),
            Source::File(PathBuf::from("Containerfile"))
        );
        assert_eq!(
            Source::parse("/abs/path/Containerfile"),
            Source::File(PathBuf::from("/abs/path/Containerfile"))
        );
        assert_eq!(
            Source::parse("file///tmp/Containerfile"),
            Source::File(PathBuf::from("/tmp/Containerfile"))
        );
        assert_eq!(
            Source::parse("https//example.org/Containerfile"),
            Source::Http {
                scheme: "https".to_owned(),
                rest: "example.org/Containerfile".to_owned(),
            }
        );
        // unrecognized scheme falls back to the file reader
        assert_eq!(
            Source::parse("ftp//host/Containerfile"),
            Source::File(PathBuf::from("host/Containerfile"))
        );
    }

    #[test]
    fn read_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "FROM x:latest\n").unwrap();

        let source = Source::parse(file.path().to_str().unwrap());
        assert_eq!(block_on(source.read()).unwrap(), "FROM x:latest\n");
    }

    #[test]
    fn read_missing_file() {
        let source = Source::parse("/does/not/exist/Containerfile");
        match block_on(source.read()) {
            Err(SpecError::Io(_)) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn read_http_source() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/Containerfile")
            .with_body("FROM x:latest\n")
            .create();

        let source = Source::parse(&format!("http//{}/Containerfile", server.host_with_port()));
        assert_eq!(block_on(source.read()).unwrap(), "FROM x:latest\n");

        let missing = Source::parse(&format!("http//{}/other", server.host_with_port()));
        match block_on(missing.read()) {
            Err(SpecError::Http { status: 501, .. }) => (),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
