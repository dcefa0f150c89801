// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::{CircuitEngine, EnterCircuitResult, ExecutionMode, ExecutionResult, ExitCircuitResult, Snapshot};
use crate::CircuitState;

/// Fake engine to be used in tests.
#[derive(Debug)]
pub(crate) struct EngineFake {
    enter_result: EnterCircuitResult,
    exit_result: ExitCircuitResult,
    abandon_result: bool,
}

impl EngineFake {
    pub fn new(enter_result: EnterCircuitResult, exit_result: ExitCircuitResult) -> Self {
        Self {
            enter_result,
            exit_result,
            abandon_result: false,
        }
    }

    pub fn with_abandon_result(self, abandon_result: bool) -> Self {
        Self { abandon_result, ..self }
    }
}

impl CircuitEngine for EngineFake {
    fn enter(&self) -> EnterCircuitResult {
        self.enter_result.clone()
    }

    fn exit(&self, _result: ExecutionResult, _mode: ExecutionMode, _generation: u64) -> ExitCircuitResult {
        self.exit_result.clone()
    }

    fn abandon(&self, _mode: ExecutionMode) -> bool {
        self.abandon_result
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: CircuitState::Closed,
            failure_count: 0,
        }
    }
}
