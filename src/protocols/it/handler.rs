//! Baseline `it` session reactions.

use tracing::debug;

use crate::command::Command;
use crate::session::Reactions;

/// Render activity as last requested by the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Rendering,
    Interactive,
}

/// Session state for one `it` connection.
#[derive(Debug, Default)]
pub struct ItHandler {
    user: Option<String>,
    state: RenderState,
    renders: u64,
    selected_object: Option<String>,
    selected_surface: Option<String>,
}

impl ItHandler {
    /// Build a handler from the connection's handshake line.
    pub fn new(handshake: &Command) -> Self {
        Self {
            user: handshake.opt("user").map(str::to_string),
            ..Default::default()
        }
    }

    // Accessors for drivers layered on top of the session state.
    #[allow(dead_code)]
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Number of renders and IPR sessions started on this connection.
    #[allow(dead_code)]
    pub fn renders(&self) -> u64 {
        self.renders
    }

    #[allow(dead_code)]
    pub fn selected_object(&self) -> Option<&str> {
        self.selected_object.as_deref()
    }

    #[allow(dead_code)]
    pub fn selected_surface(&self) -> Option<&str> {
        self.selected_surface.as_deref()
    }

    fn start(&mut self, state: RenderState, command: &Command) {
        self.state = state;
        self.renders += 1;
        let params: Vec<_> = command.pairs().collect();
        debug!(
            user = self.user.as_deref().unwrap_or("-"),
            state = ?state,
            renders = self.renders,
            crop = command.opt_or("crop", "full"),
            ?params,
            "Render requested"
        );
    }
}

impl Reactions for ItHandler {
    fn render(&mut self, command: &Command) {
        self.start(RenderState::Rendering, command);
    }

    fn render_interactive(&mut self, command: &Command) {
        self.start(RenderState::Interactive, command);
    }

    fn stop_render(&mut self, _command: &Command) {
        debug!(previous = ?self.state, "Render stopped");
        self.state = RenderState::Idle;
    }

    fn select_object(&mut self, command: &Command) {
        match command.opt("id") {
            Some(id) => {
                debug!(id, "Object selected");
                self.selected_object = Some(id.to_string());
            }
            None => {
                debug!("Object selection cleared");
                self.selected_object = None;
            }
        }
    }

    fn select_surface(&mut self, command: &Command) {
        match command.opt("id") {
            Some(id) => {
                debug!(id, "Surface selected");
                self.selected_surface = Some(id.to_string());
            }
            None => {
                debug!("Surface selection cleared");
                self.selected_surface = None;
            }
        }
    }
}
