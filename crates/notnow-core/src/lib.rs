//! Embedded issue commands: parsing, dispatch and state replay for notnow.

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod duration;
pub mod error;
pub mod executor;
pub mod grammar;
pub mod handlers;
pub mod module;
pub mod parser;
pub mod registry;
pub mod render;
pub mod replay;
pub mod schema;
pub mod snapshot;
pub mod state;
pub mod state_store;
pub mod values;

#[cfg(test)]
mod test_env;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::version;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
