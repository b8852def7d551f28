use crate::errors::SpecError;

/// One logical line of a Containerfile, after continuation and comment
/// handling: an uppercased keyword plus its raw value.
#[derive(Debug, Clone)]
pub(crate) struct Directive {
    pub keyword: String,
    pub value: String,
    pub line: usize,
}

/// Split raw Containerfile text into logical directives, in file order.
///
/// Blank lines and full-line `#` comments are dropped, including comment
/// lines appearing inside a continuation. A trailing backslash joins the
/// next content line.
pub(crate) fn logical_lines(text: &str) -> Result<Vec<Directive>, SpecError> {
    let mut directives = Vec::new();
    let mut pending: Option<(String, usize)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (content, continued) = match trimmed.strip_suffix('\\') {
            Some(stripped) => (stripped.trim_end(), true),
            None => (trimmed, false),
        };
        match pending.take() {
            Some((mut buffer, start)) => {
                if !buffer.is_empty() && !content.is_empty() {
                    buffer.push(' ');
                }
                buffer.push_str(content);
                if continued {
                    pending = Some((buffer, start));
                } else {
                    directives.push(split_directive(&buffer, start)?);
                }
            }
            None => {
                if continued {
                    pending = Some((content.to_owned(), line));
                } else {
                    directives.push(split_directive(content, line)?);
                }
            }
        }
    }

    // a continuation left open at end of input is taken as complete
    if let Some((buffer, start)) = pending {
        directives.push(split_directive(&buffer, start)?);
    }

    Ok(directives)
}

fn split_directive(content: &str, line: usize) -> Result<Directive, SpecError> {
    let mut parts = content.splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or("");
    let value = parts.next().map(str::trim).unwrap_or("");
    if keyword.is_empty() {
        return Err(SpecError::Syntax {
            line,
            detail: "empty directive".to_owned(),
        });
    }
    if value.is_empty() {
        return Err(SpecError::Syntax {
            line,
            detail: format!("directive {:?} has no value", keyword),
        });
    }
    Ok(Directive {
        keyword: keyword.to_ascii_uppercase(),
        value: value.to_owned(),
        line,
    })
}

/// Parse a LABEL/ENV directive value into key/value pairs.
///
/// The modern form is one or more `key=value` tokens, with shell-style
/// quoting; the legacy form `key value...` assigns the whole remainder to
/// one key.
pub(crate) fn key_value_pairs(
    value: &str,
    line: usize,
) -> Result<Vec<(String, String)>, SpecError> {
    let tokens = quoted_tokens(value, line)?;
    let first = match tokens.first() {
        Some(first) => first,
        None => return Ok(Vec::new()),
    };

    if !first.contains('=') {
        // legacy single-pair form
        return Ok(vec![(first.clone(), tokens[1..].join(" "))]);
    }

    let mut pairs = Vec::with_capacity(tokens.len());
    for token in &tokens {
        match token.find('=') {
            Some(pos) if pos > 0 => {
                pairs.push((token[..pos].to_owned(), token[pos + 1..].to_owned()))
            }
            _ => {
                return Err(SpecError::Syntax {
                    line,
                    detail: format!("expected key=value, found {:?}", token),
                })
            }
        }
    }
    Ok(pairs)
}

/// Split a directive value on unquoted whitespace, honoring single and
/// double quotes and backslash escapes.
fn quoted_tokens(value: &str, line: usize) -> Result<Vec<String>, SpecError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    match chars.next() {
                        Some(escaped) => current.push(escaped),
                        None => break,
                    }
                } else {
                    current.push(c);
                }
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                    in_token = true;
                } else if c == '\\' {
                    match chars.next() {
                        Some(escaped) => {
                            current.push(escaped);
                            in_token = true;
                        }
                        None => break,
                    }
                } else if c.is_whitespace() {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                } else {
                    current.push(c);
                    in_token = true;
                }
            }
        }
    }

    if quote.is_some() {
        return Err(SpecError::Syntax {
            line,
            detail: "unterminated quote".to_owned(),
        });
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
