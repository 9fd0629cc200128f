//! Per-phase task containers.
//!
//! One container per pipeline phase per frame. A container accepts tasks while `Empty`,
//! becomes `Built` when recorded into a command list, and is reset to `Empty` for the next
//! frame. The GPU task produced by the build carries the rest of the lifecycle
//! (`Submitted`, then `Retired`; see `scheduler`).

use crate::error::{RtError, RtResult};
use crate::native::NativeApi;
use crate::tasks::{BvhTask, RenderTask, RenderTaskKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Before direct lighting: BVH maintenance, AO and shadows.
    PreLighting,
    /// Reflections, GI, light injection and transfer.
    Main,
    /// After direct lighting: late light injection.
    PostLighting,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::PreLighting, Phase::Main, Phase::PostLighting];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Accepting tasks; not yet recorded.
    Empty,
    /// Recorded into a native command list.
    Built,
    /// Executed by the host; GPU task handle in flight.
    Submitted,
    /// Marked completed on the backend.
    Retired,
}

#[derive(Debug)]
pub struct TaskContainer<A: NativeApi> {
    phase: Phase,
    state: TaskState,
    bvh_tasks: Vec<BvhTask>,
    render_tasks: Vec<RenderTask<A>>,
}

impl<A: NativeApi> TaskContainer<A> {
    pub fn new(phase: Phase) -> Self {
        Self { phase, state: TaskState::Empty, bvh_tasks: Vec::new(), render_tasks: Vec::new() }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_empty(&self) -> bool {
        self.bvh_tasks.is_empty() && self.render_tasks.is_empty()
    }

    pub fn bvh_tasks(&self) -> &[BvhTask] {
        &self.bvh_tasks
    }

    pub fn render_tasks(&self) -> &[RenderTask<A>] {
        &self.render_tasks
    }

    pub fn render_task_kinds(&self) -> Vec<RenderTaskKind> {
        self.render_tasks.iter().map(RenderTask::kind).collect()
    }

    fn expect_state(&self, expected: TaskState) -> RtResult<()> {
        if self.state != expected {
            debug_assert!(false, "{:?} container is {:?}, expected {:?}", self.phase, self.state, expected);
            return Err(RtError::ContainerState { phase: self.phase, state: self.state, expected });
        }
        Ok(())
    }

    pub fn schedule_bvh_task(&mut self, task: BvhTask) -> RtResult<()> {
        self.expect_state(TaskState::Empty)?;
        self.bvh_tasks.push(task);
        Ok(())
    }

    pub fn schedule_bvh_tasks(&mut self, tasks: impl IntoIterator<Item = BvhTask>) -> RtResult<()> {
        self.expect_state(TaskState::Empty)?;
        self.bvh_tasks.extend(tasks);
        Ok(())
    }

    pub fn schedule_render_task(&mut self, task: RenderTask<A>) -> RtResult<()> {
        self.expect_state(TaskState::Empty)?;
        self.render_tasks.push(task);
        Ok(())
    }

    /// BVH tasks in recording order. With `geometry_task_first`, geometry tasks precede
    /// instance tasks (which reference them) and the build comes last; scheduling order
    /// is kept within each group.
    pub fn recorded_bvh_tasks(&self, geometry_task_first: bool) -> Vec<&BvhTask> {
        let mut tasks: Vec<&BvhTask> = self.bvh_tasks.iter().collect();
        if geometry_task_first {
            tasks.sort_by_key(|t| t.rank());
        }
        tasks
    }

    pub(crate) fn mark_built(&mut self) -> RtResult<()> {
        self.expect_state(TaskState::Empty)?;
        self.state = TaskState::Built;
        Ok(())
    }

    /// Drop all tasks and accept new ones.
    pub fn reset(&mut self) {
        self.bvh_tasks.clear();
        self.render_tasks.clear();
        self.state = TaskState::Empty;
    }
}

/// The three containers of one frame.
#[derive(Debug)]
pub struct FrameContainers<A: NativeApi> {
    pub pre_lighting: TaskContainer<A>,
    pub main: TaskContainer<A>,
    pub post_lighting: TaskContainer<A>,
}

impl<A: NativeApi> Default for FrameContainers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: NativeApi> FrameContainers<A> {
    pub fn new() -> Self {
        Self {
            pre_lighting: TaskContainer::new(Phase::PreLighting),
            main: TaskContainer::new(Phase::Main),
            post_lighting: TaskContainer::new(Phase::PostLighting),
        }
    }

    pub fn get(&self, phase: Phase) -> &TaskContainer<A> {
        match phase {
            Phase::PreLighting => &self.pre_lighting,
            Phase::Main => &self.main,
            Phase::PostLighting => &self.post_lighting,
        }
    }

    pub fn get_mut(&mut self, phase: Phase) -> &mut TaskContainer<A> {
        match phase {
            Phase::PreLighting => &mut self.pre_lighting,
            Phase::Main => &mut self.main,
            Phase::PostLighting => &mut self.post_lighting,
        }
    }

    pub fn reset_all(&mut self) {
        for phase in Phase::ALL {
            self.get_mut(phase).reset();
        }
    }
}
