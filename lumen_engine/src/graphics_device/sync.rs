/// GPU-side synchronization: semaphores and queue submissions

use crate::graphics_device::CommandList;

/// Binary semaphore signaled and waited on by the GPU
pub trait Semaphore: Send + Sync {}

/// Pipeline stage a submission waits at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    TopOfPipe,
    FragmentShader,
    ColorAttachmentOutput,
    Transfer,
    AllCommands,
}

/// One command list submitted to the graphics queue
pub struct Submission<'a> {
    /// Recorded command list
    pub command_list: &'a dyn CommandList,
    /// Semaphore to wait on, and the stage the wait blocks
    pub wait: Option<(&'a dyn Semaphore, PipelineStage)>,
    /// Semaphore signaled when the command list completes
    pub signal: Option<&'a dyn Semaphore>,
}
