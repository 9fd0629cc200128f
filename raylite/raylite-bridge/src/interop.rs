//! D3D11 submission. D3D11 work runs on the host's immediate context while ray-tracing
//! tasks run on an internal D3D12 queue, so every container is bracketed by a shared
//! fence: the host signals, the task waits and signals, the host waits.

use raylite_core::container::Phase;
use raylite_core::native::d3d11::D3D11Submission;
use raylite_core::{CommandLanes, RtError, RtResult, D3D11};
use render_api::NativeHandle;

/// Host-side fence operations on the D3D11 immediate context.
pub trait InteropQueue {
    fn signal(&mut self, fence: NativeHandle, value: u64) -> Result<(), String>;
    fn wait(&mut self, fence: NativeHandle, value: u64) -> Result<(), String>;
}

/// Lanes for D3D11: one interop fence shared by all phases, its value advancing by two
/// per recorded container.
#[derive(Debug)]
pub struct D3D11InteropLanes<Q: InteropQueue> {
    device_context: NativeHandle,
    fence: NativeHandle,
    value: u64,
    queue: Q,
}

impl<Q: InteropQueue> D3D11InteropLanes<Q> {
    pub fn new(device_context: NativeHandle, fence: NativeHandle, queue: Q) -> Self {
        Self { device_context, fence, value: 0, queue }
    }

    /// Last value signalled on the fence.
    pub fn fence_value(&self) -> u64 {
        self.value
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }
}

fn queue_call(what: &str, phase: Phase, result: Result<(), String>) -> RtResult<()> {
    result.map_err(|e| {
        log::error!("interop fence {what} before {phase:?} failed: {e}");
        RtError::Host(e)
    })
}

impl<Q: InteropQueue> CommandLanes<D3D11> for D3D11InteropLanes<Q> {
    fn begin(&mut self, phase: Phase) -> RtResult<D3D11Submission> {
        self.value += 1;
        queue_call("signal", phase, self.queue.signal(self.fence, self.value))?;
        Ok(D3D11Submission {
            device_context: self.device_context,
            fence: self.fence,
            wait_value: self.value,
            signal_value: self.value + 1,
        })
    }

    fn finish(&mut self, phase: Phase) -> RtResult<()> {
        self.value += 1;
        queue_call("wait", phase, self.queue.wait(self.fence, self.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Log(Vec<(&'static str, u64)>);

    impl InteropQueue for Log {
        fn signal(&mut self, _fence: NativeHandle, value: u64) -> Result<(), String> {
            self.0.push(("signal", value));
            Ok(())
        }

        fn wait(&mut self, _fence: NativeHandle, value: u64) -> Result<(), String> {
            self.0.push(("wait", value));
            Ok(())
        }
    }

    #[test]
    fn fence_values_bracket_each_container() {
        let mut lanes = D3D11InteropLanes::new(NativeHandle(1), NativeHandle(2), Log::default());
        let first = lanes.begin(Phase::PreLighting).unwrap();
        assert_eq!((first.wait_value, first.signal_value), (1, 2));
        lanes.finish(Phase::PreLighting).unwrap();
        let second = lanes.begin(Phase::Main).unwrap();
        assert_eq!((second.wait_value, second.signal_value), (3, 4));
        lanes.finish(Phase::Main).unwrap();
        assert_eq!(lanes.queue().0, vec![("signal", 1), ("wait", 2), ("signal", 3), ("wait", 4)]);
        assert_eq!(lanes.fence_value(), 4);
    }
}
