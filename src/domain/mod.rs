// Domain layer: the number payloads, targets and the shared deadline, plus the ports the core
// depends on. No HTTP server types leak in here.

pub mod model;
pub mod ports;
