use std::path::PathBuf;

/// Overall UI state.
#[derive(Default)]
pub struct UIState {
    pub file_path: Option<PathBuf>,
    pub image_size: Option<(u32, u32)>,
    /// Probing or decoding the first level.
    pub loading: bool,

    /// View size last pushed to the viewer, in points.
    pub view_size: Option<(u32, u32)>,

    /// Log messages.
    pub log_messages: Vec<String>,
}

impl UIState {
    pub fn add_log(&mut self, msg: String) {
        self.log_messages.push(msg);
    }

    pub fn file_name(&self) -> Option<String> {
        self.file_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}
