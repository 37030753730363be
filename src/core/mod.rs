//! Runtime components: sensor acquisition, bus recovery and the driving loop.

pub mod executor;
pub mod recovery;
pub mod sensor;
