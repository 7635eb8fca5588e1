//! Engine binary serving fixture circuits over the voltset protocol.
//!
//! The circuit path sent with `open` names the fixture file to load.

use voltset_oracle::{run_engine_plugin, FixtureEngine};

fn main() {
    run_engine_plugin(FixtureEngine::default());
}
