// Domain layer: listing entities and the collaborator ports. No I/O here.

pub mod model;
pub mod ports;
