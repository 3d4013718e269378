pub(crate) mod conformance_controller;
pub(crate) mod health_check_controller;
pub(crate) mod hello_controller;
pub(crate) mod signals_controller;
pub(crate) mod ticker_controller;
