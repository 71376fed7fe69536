pub(crate) mod fs;
pub(crate) mod jwt;
pub(crate) mod logging;
