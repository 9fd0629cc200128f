//! Command-list lanes: where the renderer records each phase's container.

use crate::container::Phase;
use crate::error::RtResult;
use crate::native::NativeApi;

/// Supplies the native command list a phase is recorded into, and is told when the
/// recording is done so it can submit or fence.
pub trait CommandLanes<A: NativeApi> {
    fn begin(&mut self, phase: Phase) -> RtResult<A::CommandList>;

    fn finish(&mut self, _phase: Phase) -> RtResult<()> {
        Ok(())
    }
}

/// One pre-opened command list per phase, executed by the host in phase order.
#[derive(Clone, Debug)]
pub struct FixedLanes<A: NativeApi> {
    pub pre_lighting: A::CommandList,
    pub main: A::CommandList,
    pub post_lighting: A::CommandList,
}

impl<A: NativeApi> FixedLanes<A> {
    /// All phases recorded into the same list.
    pub fn single(command_list: A::CommandList) -> Self {
        Self { pre_lighting: command_list.clone(), main: command_list.clone(), post_lighting: command_list }
    }
}

impl<A: NativeApi> CommandLanes<A> for FixedLanes<A> {
    fn begin(&mut self, phase: Phase) -> RtResult<A::CommandList> {
        Ok(match phase {
            Phase::PreLighting => self.pre_lighting.clone(),
            Phase::Main => self.main.clone(),
            Phase::PostLighting => self.post_lighting.clone(),
        })
    }
}
