#![allow(dead_code)]

use gps_spoofer::platform::simulated::SimulatedPlatform;
use gps_spoofer::AppState;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub sim: SimulatedPlatform,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_platform(SimulatedPlatform::new())
    }

    pub fn with_platform(sim: SimulatedPlatform) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let state = gps_spoofer::setup(sim.platform(), &tmp.path().join("data"))
            .expect("build app state");
        Self {
            _tmp: tmp,
            sim,
            state,
        }
    }

    pub async fn call(&self, method: &str, args: Value) -> Value {
        gps_spoofer::commands::handle_command(&self.state, method, args)
            .await
            .unwrap_or_else(|err| panic!("{method} failed: {err}"))
    }
}
