pub(crate) mod cache;
pub(crate) mod image;
pub(crate) mod source;
pub(crate) mod url;
