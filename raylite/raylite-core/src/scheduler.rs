//! GPU task lifetime. Built containers become GPU tasks tagged with their frame; a task is
//! marked completed once the render-ahead window has passed it, or forcibly on teardown.

use std::collections::VecDeque;

use render_api::HostDevice;

use crate::config::RayliteConfig;
use crate::container::{Phase, TaskContainer, TaskState};
use crate::error::{host_call, sdk_call, RtResult};
use crate::native::NativeApi;
use crate::sdk::{ExecuteContext, GpuTaskHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InFlightGpuTask {
    pub handle: GpuTaskHandle,
    pub phase: Phase,
    pub submitted_frame: u64,
    /// `Submitted` while tracked, `Retired` once marked completed.
    pub state: TaskState,
}

#[derive(Debug)]
pub struct GpuTaskScheduler {
    in_flight: VecDeque<InFlightGpuTask>,
    max_render_ahead_frames: u64,
    capacity: usize,
    forced_retirements: u64,
}

impl GpuTaskScheduler {
    pub fn new(config: &RayliteConfig) -> Self {
        Self {
            in_flight: VecDeque::with_capacity(config.max_in_flight_tasks()),
            max_render_ahead_frames: config.max_render_ahead_frames as u64,
            capacity: config.max_in_flight_tasks(),
            forced_retirements: 0,
        }
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &InFlightGpuTask> {
        self.in_flight.iter()
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retirements forced by a full window.
    pub fn forced_retirements(&self) -> u64 {
        self.forced_retirements
    }

    fn expired(&self, submitted_frame: u64, current_frame: u64) -> bool {
        current_frame
            .checked_sub(submitted_frame)
            .is_some_and(|age| age >= self.max_render_ahead_frames)
    }

    fn complete<C: ExecuteContext>(ctx: &mut C, mut task: InFlightGpuTask) -> RtResult<InFlightGpuTask> {
        sdk_call("MarkGPUTaskAsCompleted", ctx.mark_gpu_task_as_completed(task.handle))?;
        task.state = TaskState::Retired;
        Ok(task)
    }

    /// Mark completed every task the render-ahead window has passed.
    pub fn retire<C: ExecuteContext>(&mut self, ctx: &mut C, current_frame: u64) -> RtResult<Vec<InFlightGpuTask>> {
        let mut retired = Vec::new();
        let mut kept = VecDeque::with_capacity(self.in_flight.len());
        while let Some(task) = self.in_flight.pop_front() {
            if self.expired(task.submitted_frame, current_frame) {
                match Self::complete(ctx, task) {
                    Ok(task) => retired.push(task),
                    Err(e) => {
                        kept.push_back(task);
                        kept.extend(self.in_flight.drain(..));
                        self.in_flight = kept;
                        return Err(e);
                    }
                }
            } else {
                kept.push_back(task);
            }
        }
        self.in_flight = kept;
        if !retired.is_empty() {
            log::trace!("retired {} GPU tasks at frame {current_frame}", retired.len());
        }
        Ok(retired)
    }

    /// Record `container` into `command_list` and track the resulting task. A full window
    /// waits for the device and retires the oldest task first.
    pub fn submit<C: ExecuteContext>(
        &mut self,
        ctx: &mut C,
        container: &mut TaskContainer<C::Api>,
        command_list: &<C::Api as NativeApi>::CommandList,
        frame: u64,
        host: &dyn HostDevice,
    ) -> RtResult<GpuTaskHandle> {
        if self.in_flight.len() >= self.capacity {
            log::warn!(
                "{} GPU tasks in flight at frame {frame}; waiting for the device before submitting",
                self.in_flight.len()
            );
            host_call("wait for idle", host.wait_idle())?;
            if let Some(oldest) = self.in_flight.pop_front() {
                Self::complete(ctx, oldest)?;
                self.forced_retirements += 1;
            }
        }

        container.mark_built()?;
        let input = <C::Api as NativeApi>::build_input(command_list, true);
        let built = ctx.build_gpu_task(container, &input);
        let phase = container.phase();
        container.reset();
        let handle = sdk_call("BuildGPUTask", built)?;

        self.in_flight.push_back(InFlightGpuTask { handle, phase, submitted_frame: frame, state: TaskState::Submitted });
        debug_assert!(self.in_flight.len() <= self.capacity);
        Ok(handle)
    }

    /// Mark every tracked task completed. The device must be idle.
    pub fn retire_all<C: ExecuteContext>(&mut self, ctx: &mut C) -> RtResult<usize> {
        let mut count = 0;
        while let Some(task) = self.in_flight.pop_front() {
            Self::complete(ctx, task)?;
            count += 1;
        }
        if count > 0 {
            log::debug!("force-retired {count} GPU tasks");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::d3d12::D3D12CommandList;
    use crate::native::D3D12;
    use crate::sdk::{ExecuteContextSettings, HeadlessContext, SdkCall};
    use crate::testing::TestHost;
    use render_api::NativeHandle;

    fn setup(config: &RayliteConfig) -> (HeadlessContext<D3D12>, GpuTaskScheduler, TaskContainer<D3D12>) {
        (
            HeadlessContext::new(ExecuteContextSettings::from_config(config, Vec::new())),
            GpuTaskScheduler::new(config),
            TaskContainer::new(Phase::Main),
        )
    }

    const CL: D3D12CommandList = D3D12CommandList(NativeHandle(0xc1));

    #[test]
    fn retirement_follows_render_ahead_window() {
        let config = RayliteConfig::default();
        let (mut ctx, mut scheduler, mut container) = setup(&config);
        let host = TestHost::default();
        for frame in 0..=10u64 {
            let retired = scheduler.retire(&mut ctx, frame).unwrap();
            for task in &retired {
                assert!(frame - task.submitted_frame >= 3);
                assert_eq!(task.state, TaskState::Retired);
            }
            for task in scheduler.in_flight() {
                assert!(frame - task.submitted_frame < 3);
            }
            let expected: Vec<u64> = (frame.saturating_sub(2)..frame).collect();
            let frames: Vec<u64> = scheduler.in_flight().map(|t| t.submitted_frame).collect();
            assert_eq!(frames, expected, "frame {frame}");
            scheduler.submit(&mut ctx, &mut container, &CL, frame, &host).unwrap();
        }
        assert_eq!(host.waits(), 0);
        assert_eq!(ctx.in_flight(), scheduler.len());
    }

    #[test]
    fn full_window_forces_a_retirement() {
        let config = RayliteConfig::default();
        let (mut ctx, mut scheduler, mut container) = setup(&config);
        let host = TestHost::default();
        let bound = config.max_in_flight_tasks();
        for _ in 0..bound {
            scheduler.submit(&mut ctx, &mut container, &CL, 0, &host).unwrap();
        }
        assert_eq!(scheduler.len(), bound);
        assert_eq!(host.waits(), 0);

        scheduler.submit(&mut ctx, &mut container, &CL, 0, &host).unwrap();
        assert_eq!(scheduler.len(), bound);
        assert_eq!(host.waits(), 1);
        assert_eq!(scheduler.forced_retirements(), 1);
        assert_eq!(ctx.counts().gpu_tasks_completed, 1);
    }

    #[test]
    fn retire_all_empties_the_window() {
        let config = RayliteConfig::default();
        let (mut ctx, mut scheduler, mut container) = setup(&config);
        let host = TestHost::default();
        for frame in 0..3 {
            scheduler.submit(&mut ctx, &mut container, &CL, frame, &host).unwrap();
        }
        assert_eq!(scheduler.retire_all(&mut ctx).unwrap(), 3);
        assert!(scheduler.is_empty());
        assert_eq!(ctx.in_flight(), 0);
    }

    #[test]
    fn failed_build_resets_container() {
        let config = RayliteConfig::default();
        let (mut ctx, mut scheduler, mut container) = setup(&config);
        ctx.fail_next(SdkCall::BuildGpuTask, crate::error::SdkError::OutOfMemory);
        let err = scheduler.submit(&mut ctx, &mut container, &CL, 0, &TestHost::default()).unwrap_err();
        assert!(matches!(err, crate::error::RtError::Sdk { call: "BuildGPUTask", .. }));
        assert_eq!(container.state(), TaskState::Empty);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn frame_going_backwards_retires_nothing() {
        let config = RayliteConfig::default();
        let (mut ctx, mut scheduler, mut container) = setup(&config);
        scheduler.submit(&mut ctx, &mut container, &CL, 10, &TestHost::default()).unwrap();
        assert!(scheduler.retire(&mut ctx, 2).unwrap().is_empty());
        assert_eq!(scheduler.len(), 1);
    }
}
