//! The rendering thread and its command queue.
//!
//! The game thread never touches the device directly. It enqueues
//! [`RenderCommand`]s which the rendering thread executes in order against the
//! [`RenderContext`] it owns while running:
//!
//! ```ignore
//! let mut thread = RenderingThread::new(RenderContext::new(rhi));
//! thread.start()?;
//! thread.enqueue_execute("UploadMesh", move |ctx| { /* ... */ })?;
//! thread.flush()?;
//! let context = thread.stop()?;
//! ```
//!
//! While stopped, commands run inline on the calling thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use lumen_core::profile_scope;

use crate::context::DeviceContext;
use crate::device::Rhi;
use crate::error::GraphicsError;
use crate::renderer::SceneRenderer;
use crate::viewport::SharedViewport;

/// Everything the rendering thread owns: the device, its immediate context
/// and an optional scene renderer.
pub struct RenderContext {
    pub rhi: Arc<Rhi>,
    pub immediate: DeviceContext,
    pub renderer: Option<SceneRenderer>,
}

impl RenderContext {
    pub fn new(rhi: Arc<Rhi>) -> Self {
        let immediate = rhi.create_immediate_context();
        Self {
            rhi,
            immediate,
            renderer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: SceneRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("rhi", &self.rhi)
            .field("pending_commands", &self.immediate.commands().len())
            .field("renderer", &self.renderer)
            .finish()
    }
}

/// Work executed by the rendering thread.
pub type RenderWork = Box<dyn FnOnce(&mut RenderContext) + Send>;

/// Commands understood by the rendering thread, executed in enqueue order.
pub enum RenderCommand {
    /// Fire-and-forget closure.
    Execute { name: &'static str, work: RenderWork },
    BeginDrawingViewport(SharedViewport),
    EndDrawingViewport {
        viewport: SharedViewport,
        present: bool,
        lock_to_vsync: bool,
    },
    ResizeViewport {
        viewport: SharedViewport,
        width: u32,
        height: u32,
    },
    /// Signalled once every earlier command has executed.
    Fence(Sender<()>),
    Shutdown,
}

impl RenderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Execute { name, .. } => name,
            Self::BeginDrawingViewport(_) => "BeginDrawingViewport",
            Self::EndDrawingViewport { .. } => "EndDrawingViewport",
            Self::ResizeViewport { .. } => "ResizeViewport",
            Self::Fence(_) => "Fence",
            Self::Shutdown => "Shutdown",
        }
    }
}

impl std::fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RenderCommand").field(&self.name()).finish()
    }
}

/// Run one command. Returns `false` on shutdown.
///
/// Failures have no caller to report to and are logged.
fn execute(command: RenderCommand, ctx: &mut RenderContext) -> bool {
    let name = command.name();
    let result = match command {
        RenderCommand::Execute { work, .. } => {
            profile_scope!("RenderCommand::Execute");
            log::trace!("RenderThread: executing {name}");
            work(ctx);
            Ok(())
        }
        RenderCommand::BeginDrawingViewport(viewport) => {
            let viewport = viewport.lock();
            ctx.rhi.begin_drawing_viewport(&mut ctx.immediate, &viewport)
        }
        RenderCommand::EndDrawingViewport {
            viewport,
            present,
            lock_to_vsync,
        } => {
            let mut viewport = viewport.lock();
            ctx.rhi
                .end_drawing_viewport(&mut ctx.immediate, &mut viewport, present, lock_to_vsync)
        }
        RenderCommand::ResizeViewport {
            viewport,
            width,
            height,
        } => viewport.lock().resize(&ctx.rhi, width, height).map(|_| ()),
        RenderCommand::Fence(done) => {
            let _ = done.send(());
            Ok(())
        }
        RenderCommand::Shutdown => return false,
    };
    if let Err(e) = result {
        log::error!("RenderThread: {name} failed: {e}");
    }
    true
}

fn render_thread_main(receiver: Receiver<RenderCommand>, mut ctx: RenderContext) -> RenderContext {
    log::info!("RenderThread: started");
    while let Ok(command) = receiver.recv() {
        if !execute(command, &mut ctx) {
            break;
        }
    }
    log::info!("RenderThread: stopped");
    ctx
}

struct Running {
    sender: Sender<RenderCommand>,
    handle: JoinHandle<RenderContext>,
}

/// Owner of the rendering thread and its command queue.
pub struct RenderingThread {
    running: Option<Running>,
    /// Present while stopped.
    context: Option<RenderContext>,
}

impl RenderingThread {
    /// A stopped rendering thread holding `context`.
    pub fn new(context: RenderContext) -> Self {
        Self {
            running: None,
            context: Some(context),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Context used for inline execution; `None` while the thread runs.
    pub fn context(&self) -> Option<&RenderContext> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut RenderContext> {
        self.context.as_mut()
    }

    /// Move the context to a new thread named `RenderThread`.
    pub fn start(&mut self) -> Result<(), GraphicsError> {
        if self.running.is_some() {
            log::warn!("RenderingThread::start: already running");
            return Ok(());
        }
        let Some(context) = self.context.take() else {
            return Err(GraphicsError::Internal(
                "rendering thread has no context".to_string(),
            ));
        };
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name("RenderThread".to_string())
            .spawn(move || render_thread_main(receiver, context))
            .map_err(|e| GraphicsError::Internal(format!("failed to spawn render thread: {e}")))?;
        self.running = Some(Running { sender, handle });
        Ok(())
    }

    /// Drain the queue, join the thread and take the context back.
    pub fn stop(&mut self) -> Result<(), GraphicsError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.sender.send(RenderCommand::Shutdown);
        match running.handle.join() {
            Ok(context) => {
                self.context = Some(context);
                Ok(())
            }
            Err(_) => Err(GraphicsError::Internal(
                "render thread panicked".to_string(),
            )),
        }
    }

    /// Queue a command, or run it now when stopped.
    pub fn enqueue(&mut self, command: RenderCommand) -> Result<(), GraphicsError> {
        if let Some(running) = &self.running {
            return running
                .sender
                .send(command)
                .map_err(|_| GraphicsError::RenderThreadDisconnected);
        }
        match self.context.as_mut() {
            Some(ctx) => {
                execute(command, ctx);
                Ok(())
            }
            None => Err(GraphicsError::RenderThreadDisconnected),
        }
    }

    pub fn enqueue_execute(
        &mut self,
        name: &'static str,
        work: impl FnOnce(&mut RenderContext) + Send + 'static,
    ) -> Result<(), GraphicsError> {
        self.enqueue(RenderCommand::Execute {
            name,
            work: Box::new(work),
        })
    }

    /// Run `work` on the rendering thread and wait for its result.
    pub fn enqueue_and_wait<R: Send + 'static>(
        &mut self,
        name: &'static str,
        work: impl FnOnce(&mut RenderContext) -> R + Send + 'static,
    ) -> Result<R, GraphicsError> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.enqueue_execute(name, move |ctx| {
            let _ = sender.send(work(ctx));
        })?;
        receiver
            .recv()
            .map_err(|_| GraphicsError::RenderThreadDisconnected)
    }

    /// Block until every command enqueued so far has executed.
    pub fn flush(&mut self) -> Result<(), GraphicsError> {
        profile_scope!("RenderingThread::flush");
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.enqueue(RenderCommand::Fence(sender))?;
        receiver
            .recv()
            .map_err(|_| GraphicsError::RenderThreadDisconnected)
    }
}

impl Drop for RenderingThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("RenderingThread: {e}");
        }
    }
}

impl std::fmt::Debug for RenderingThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderingThread")
            .field("running", &self.is_running())
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderContext: Send);
static_assertions::assert_impl_all!(RenderCommand: Send);
