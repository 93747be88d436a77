// Domain layer: vehicle models and ports (collaborator interfaces). No engine dependencies.

pub mod model;
pub mod ports;
