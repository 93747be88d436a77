// Adapters layer: concrete implementations of the domain ports.
// The in-memory world backs the CLI and doubles as the test fixture.

pub mod memory;
