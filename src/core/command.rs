use std::fmt;

use strum::IntoStaticStr;

use super::{
    controller::{SharedController, TimerBlock, Validation},
    error::GatewayError,
};

/// One queued device action, bound to its target controller.
///
/// `target` is `None` when the router could not resolve the device id; such a
/// command executes as a no-op.
#[derive(Clone, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    CoilsOn {
        target: Option<SharedController>,
        coils: Vec<u16>,
    },
    CoilsOff {
        target: Option<SharedController>,
        coils: Vec<u16>,
    },
    Validate {
        target: Option<SharedController>,
    },
    TimerSet {
        target: Option<SharedController>,
        start_address: u16,
        values: TimerBlock,
    },
    ResetTimers {
        target: Option<SharedController>,
    },
}

/// What happened when a command ran. Failures are values, not panics.
#[derive(Debug)]
pub enum Outcome {
    Applied,
    Validated(Validation),
    Restored(usize),
    NoTarget,
    Failed(GatewayError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl Command {
    pub fn coils_on(target: Option<SharedController>, coils: Vec<u16>) -> Self {
        Command::CoilsOn { target, coils }
    }

    pub fn coils_off(target: Option<SharedController>, coils: Vec<u16>) -> Self {
        Command::CoilsOff { target, coils }
    }

    pub fn validate(target: Option<SharedController>) -> Self {
        Command::Validate { target }
    }

    pub fn timer_set(
        target: Option<SharedController>,
        start_address: u16,
        values: TimerBlock,
    ) -> Self {
        Command::TimerSet {
            target,
            start_address,
            values,
        }
    }

    pub fn reset_timers(target: Option<SharedController>) -> Self {
        Command::ResetTimers { target }
    }

    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn target(&self) -> Option<&SharedController> {
        match self {
            Command::CoilsOn { target, .. }
            | Command::CoilsOff { target, .. }
            | Command::Validate { target }
            | Command::TimerSet { target, .. }
            | Command::ResetTimers { target } => target.as_ref(),
        }
    }

    /// Id of the bound controller, if any.
    pub fn target_id(&self) -> Option<String> {
        self.target().map(|target| target.lock().id().to_string())
    }

    /// Run the command against its controller.
    pub fn execute(&self) -> Outcome {
        let Some(target) = self.target() else {
            log::warn!("{} has no target device, skipped", self.name());
            return Outcome::NoTarget;
        };
        let mut plc = target.lock();

        let result = match self {
            Command::CoilsOn { coils, .. } => plc.coils_on(coils).map(|_| Outcome::Applied),
            Command::CoilsOff { coils, .. } => plc.coils_off(coils).map(|_| Outcome::Applied),
            Command::Validate { .. } => Ok(Outcome::Validated(plc.validate())),
            Command::TimerSet {
                start_address,
                values,
                ..
            } => plc
                .timer_set(*start_address, *values)
                .map(|_| Outcome::Applied),
            Command::ResetTimers { .. } => plc.reset_timers().map(Outcome::Restored),
        };

        result.unwrap_or_else(Outcome::Failed)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.target_id();
        match self {
            Command::CoilsOn { coils, .. } | Command::CoilsOff { coils, .. } => f
                .debug_struct(self.name())
                .field("target", &target)
                .field("coils", coils)
                .finish(),
            Command::TimerSet {
                start_address,
                values,
                ..
            } => f
                .debug_struct(self.name())
                .field("target", &target)
                .field("start_address", start_address)
                .field("values", values)
                .finish(),
            Command::Validate { .. } | Command::ResetTimers { .. } => f
                .debug_struct(self.name())
                .field("target", &target)
                .finish(),
        }
    }
}
