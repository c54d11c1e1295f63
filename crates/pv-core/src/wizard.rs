//! Setup wizard: pick a file, pick or build a view, then plot it

use std::any::Any;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{CoreError, Result};
use crate::events::events::SetupFinished;
use crate::events::EventBus;
use crate::model::{FileId, PlotSettings, ViewChanges, ViewId};
use crate::store::ViewStore;

/// Values collected by the wizard pages, keyed by name
pub type WizardData = IndexMap<String, Value>;

/// One page of the setup wizard
pub trait WizardStep: Send + Sync {
    fn title(&self) -> &str;

    /// Text describing the page for the current data
    fn content(&self, data: &WizardData) -> String;

    /// Whether the user may leave this page forward
    fn is_allowed_to_next(&self, data: &WizardData) -> bool;

    /// Key/value pairs merged into the wizard data when leaving forward
    fn return_value(&self) -> Vec<(&'static str, Value)>;

    /// Keys this page writes; cleared when the user navigates back to it
    fn output_keys(&self) -> &'static [&'static str];

    /// Forget any input made on this page
    fn reset(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Choose an already uploaded file
#[derive(Debug, Default)]
pub struct FileSelectStep {
    file: Option<FileId>,
}

impl FileSelectStep {
    pub fn select(&mut self, file: FileId) {
        self.file = Some(file);
    }
}

impl WizardStep for FileSelectStep {
    fn title(&self) -> &str {
        "Select file to work with"
    }

    fn content(&self, _data: &WizardData) -> String {
        match self.file {
            Some(file) => format!("Selected file {file}"),
            None => "Pick a file or continue to upload a new one".to_string(),
        }
    }

    // Skipping is allowed; the upload page then requires a file
    fn is_allowed_to_next(&self, _data: &WizardData) -> bool {
        true
    }

    fn return_value(&self) -> Vec<(&'static str, Value)> {
        vec![("file", json!(self.file))]
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["file"]
    }

    fn reset(&mut self) {
        self.file = None;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Upload a new file when none was selected
#[derive(Debug, Default)]
pub struct DataUploadStep {
    uploaded: Option<FileId>,
}

impl DataUploadStep {
    pub fn set_uploaded(&mut self, file: FileId) {
        self.uploaded = Some(file);
    }
}

impl WizardStep for DataUploadStep {
    fn title(&self) -> &str {
        "Provide a file with data"
    }

    fn content(&self, data: &WizardData) -> String {
        if file_id(data).is_some() && self.uploaded.is_none() {
            "A file is already selected".to_string()
        } else {
            "Upload a CSV file".to_string()
        }
    }

    fn is_allowed_to_next(&self, data: &WizardData) -> bool {
        self.uploaded.is_some() || file_id(data).is_some()
    }

    fn return_value(&self) -> Vec<(&'static str, Value)> {
        match self.uploaded {
            Some(file) => vec![("file", json!(file))],
            None => Vec::new(),
        }
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn reset(&mut self) {
        self.uploaded = None;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewChoice {
    Existing(ViewId),
    Edit(ViewId),
    New,
}

/// Reuse, edit or create a view over the chosen file
#[derive(Debug, Default)]
pub struct ViewSelectStep {
    choice: Option<ViewChoice>,
}

impl ViewSelectStep {
    pub fn select(&mut self, view: ViewId) {
        self.choice = Some(ViewChoice::Existing(view));
    }

    pub fn edit(&mut self, view: ViewId) {
        self.choice = Some(ViewChoice::Edit(view));
    }

    pub fn create_new(&mut self) {
        self.choice = Some(ViewChoice::New);
    }
}

impl WizardStep for ViewSelectStep {
    fn title(&self) -> &str {
        "Select or create View over File"
    }

    fn content(&self, data: &WizardData) -> String {
        match file_id(data) {
            Some(file) => format!("Views over file {file}"),
            None => "No file selected".to_string(),
        }
    }

    fn is_allowed_to_next(&self, _data: &WizardData) -> bool {
        self.choice.is_some()
    }

    fn return_value(&self) -> Vec<(&'static str, Value)> {
        let (view, edit) = match self.choice {
            Some(ViewChoice::Existing(id)) => (Some(id), false),
            Some(ViewChoice::Edit(id)) => (Some(id), true),
            Some(ViewChoice::New) | None => (None, false),
        };
        vec![("view", json!(view)), ("viewEdit", json!(edit))]
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["view", "viewEdit"]
    }

    fn reset(&mut self) {
        self.choice = None;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Build the plots of a new or edited view
#[derive(Debug, Default)]
pub struct ViewMakerStep {
    title: String,
    plots: Vec<PlotSettings>,
}

impl ViewMakerStep {
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn add_plot(&mut self, plot: PlotSettings) {
        self.plots.push(plot);
    }

    pub fn remove_plot(&mut self, idx: usize) -> Option<PlotSettings> {
        (idx < self.plots.len()).then(|| self.plots.remove(idx))
    }
}

impl WizardStep for ViewMakerStep {
    fn title(&self) -> &str {
        "Create view by selecting axes and functions over data"
    }

    fn content(&self, data: &WizardData) -> String {
        if data.get("view").map_or(false, |v| !v.is_null()) && !is_edit(data) {
            "Using the selected view".to_string()
        } else {
            format!("{} plot(s) defined", self.plots.len())
        }
    }

    fn is_allowed_to_next(&self, _data: &WizardData) -> bool {
        true
    }

    fn return_value(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("title", json!(self.title)),
            ("plotSettings", json!(self.plots)),
        ]
    }

    fn output_keys(&self) -> &'static [&'static str] {
        &["title", "plotSettings"]
    }

    fn reset(&mut self) {
        self.title.clear();
        self.plots.clear();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Result of moving the wizard forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardProgress {
    /// Moved to the page with this index
    Advanced(usize),
    /// The last page was accepted; call `finish`
    Ready,
}

/// View chosen by a finished wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupOutcome {
    pub view_id: ViewId,
    pub file_id: FileId,
    pub created: bool,
}

/// Ordered list of wizard pages and the data they collected
pub struct SetupWizard {
    steps: Vec<Box<dyn WizardStep>>,
    active: usize,
    data: WizardData,
}

impl SetupWizard {
    /// Wizard with the standard file → upload → view → maker pages
    pub fn new() -> Self {
        Self::with_steps(vec![
            Box::new(FileSelectStep::default()),
            Box::new(DataUploadStep::default()),
            Box::new(ViewSelectStep::default()),
            Box::new(ViewMakerStep::default()),
        ])
    }

    pub fn with_steps(steps: Vec<Box<dyn WizardStep>>) -> Self {
        Self {
            steps,
            active: 0,
            data: WizardData::new(),
        }
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.active + 1 == self.steps.len()
    }

    pub fn data(&self) -> &WizardData {
        &self.data
    }

    pub fn active_step(&self) -> Option<&dyn WizardStep> {
        self.steps.get(self.active).map(|s| s.as_ref())
    }

    /// Header shown for the active page
    pub fn header(&self) -> String {
        match self.active_step() {
            Some(step) => format!("Step {}: {}", self.active + 1, step.title()),
            None => String::new(),
        }
    }

    pub fn can_go_next(&self) -> bool {
        self.active_step()
            .map_or(false, |step| step.is_allowed_to_next(&self.data))
    }

    /// Find a page by type to feed it user input
    pub fn step_mut<T: WizardStep + 'static>(&mut self) -> Option<&mut T> {
        self.steps
            .iter_mut()
            .find_map(|step| step.as_any_mut().downcast_mut::<T>())
    }

    /// Accept the active page and move forward
    pub fn next(&mut self) -> Result<WizardProgress> {
        let step = self
            .steps
            .get(self.active)
            .ok_or_else(|| CoreError::ValidationFailed("wizard has no pages".to_string()))?;

        if !step.is_allowed_to_next(&self.data) {
            return Err(CoreError::ValidationFailed(format!(
                "step '{}' is not complete",
                step.title()
            )));
        }

        for (key, value) in step.return_value() {
            self.data.insert(key.to_string(), value);
        }
        debug!(page = self.active, "Wizard page accepted");

        if self.is_last() {
            Ok(WizardProgress::Ready)
        } else {
            self.active += 1;
            Ok(WizardProgress::Advanced(self.active))
        }
    }

    /// Go back one page, clearing what that page had produced
    pub fn previous(&mut self) -> bool {
        if self.active == 0 {
            return false;
        }
        self.active -= 1;
        let step = &mut self.steps[self.active];
        step.reset();
        for key in step.output_keys() {
            self.data.shift_remove(*key);
        }
        true
    }

    /// Start over from the first page
    pub fn restart(&mut self) {
        self.active = 0;
        self.data.clear();
        for step in &mut self.steps {
            step.reset();
        }
    }

    /// Resolve the collected data to a stored view and announce it
    pub async fn finish(&self, views: &dyn ViewStore, events: &EventBus) -> Result<SetupOutcome> {
        let file_id = file_id(&self.data)
            .ok_or_else(|| CoreError::ValidationFailed("no file selected".to_string()))?;
        let view = uuid_value(&self.data, "view");
        let title = self
            .data
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let outcome = match view {
            Some(view_id) if is_edit(&self.data) => {
                let changes = ViewChanges {
                    title: Some(title),
                    file_id: Some(file_id),
                    plot_settings: Some(self.plot_settings()?),
                };
                views.update(view_id, changes).await?;
                SetupOutcome { view_id, file_id, created: false }
            }
            Some(view_id) => SetupOutcome { view_id, file_id, created: false },
            None => {
                let view_id = views.create(&title, file_id, self.plot_settings()?).await?;
                SetupOutcome { view_id, file_id, created: true }
            }
        };

        info!(view_id = %outcome.view_id, created = outcome.created, "Setup finished");
        events.publish(SetupFinished {
            view_id: outcome.view_id,
            file_id: Some(outcome.file_id),
        });
        Ok(outcome)
    }

    fn plot_settings(&self) -> Result<Vec<PlotSettings>> {
        match self.data.get("plotSettings") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| CoreError::MalformedInput(format!("plot settings: {e}"))),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for SetupWizard {
    fn default() -> Self {
        Self::new()
    }
}

fn uuid_value(data: &WizardData, key: &str) -> Option<uuid::Uuid> {
    data.get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn file_id(data: &WizardData) -> Option<FileId> {
    uuid_value(data, "file")
}

fn is_edit(data: &WizardData) -> bool {
    data.get("viewEdit").and_then(Value::as_bool).unwrap_or(false)
}
