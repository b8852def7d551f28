#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("pkgbox builds only run on linux or android");

#[macro_use] extern crate lazy_static;

pub mod containerfile;
pub mod errors;
pub mod image;
pub mod manifest;
pub mod paths;
pub mod registry;
pub mod runtime;
pub mod source;

pub use crate::{
    containerfile::BuildSpec,
    errors::Error,
    image::{Descriptor, Reference},
};
