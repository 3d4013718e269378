pub(crate) mod datastar_request;
pub(crate) mod signals;
