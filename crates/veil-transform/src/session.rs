//! State shared by every transformer during one anonymization run.

use std::collections::HashMap;

use tracing::debug;
use veil_map::{MappingStore, RepairStore};
use veil_model::{EmailAction, JsonReportReader, ReportReader};

use crate::decide::{AutoDecider, Decider};
use crate::issues::IssueCollector;

/// Where a record came from, for issue reporting and cached decisions.
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    pub task: &'a str,
    pub file: &'a str,
    pub line: Option<usize>,
}

impl<'a> Location<'a> {
    pub fn new(task: &'a str, file: &'a str, line: Option<usize>) -> Self {
        Self { task, file, line }
    }
}

/// Mapping store, repair rules, collected issues and the decision callback.
///
/// Email decisions are remembered per `(task, field path)` for the lifetime
/// of the session.
pub struct Session {
    pub(crate) mapping: MappingStore,
    pub(crate) repairs: RepairStore,
    pub(crate) issues: IssueCollector,
    pub(crate) report_reader: Box<dyn ReportReader>,
    decider: Box<dyn Decider>,
    interactive: bool,
    email_decisions: HashMap<(String, String), EmailAction>,
}

impl Session {
    pub fn new(mapping: MappingStore, repairs: RepairStore) -> Self {
        Self {
            mapping,
            repairs,
            issues: IssueCollector::new(),
            report_reader: Box::new(JsonReportReader),
            decider: Box::new(AutoDecider),
            interactive: false,
            email_decisions: HashMap::new(),
        }
    }

    /// Routes questions to `decider` and enables interactive repairs.
    #[must_use]
    pub fn with_decider(mut self, decider: Box<dyn Decider>, interactive: bool) -> Self {
        self.decider = decider;
        self.interactive = interactive;
        self
    }

    #[must_use]
    pub fn with_report_reader(mut self, reader: Box<dyn ReportReader>) -> Self {
        self.report_reader = reader;
        self
    }

    pub fn interactive(&self) -> bool {
        self.interactive
    }

    pub fn mapping(&self) -> &MappingStore {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut MappingStore {
        &mut self.mapping
    }

    pub fn repairs(&self) -> &RepairStore {
        &self.repairs
    }

    pub fn issues(&self) -> &IssueCollector {
        &self.issues
    }

    pub fn issues_mut(&mut self) -> &mut IssueCollector {
        &mut self.issues
    }

    /// Asks the decision callback; out-of-range answers select option 0.
    pub fn decide(&mut self, prompt: &str, options: &[String]) -> usize {
        if options.is_empty() {
            return 0;
        }
        let choice = self.decider.decide(prompt, options);
        if choice < options.len() { choice } else { 0 }
    }

    /// The remembered or newly decided action for emails at `field_path`.
    pub fn email_action(&mut self, task: &str, field_path: &str) -> EmailAction {
        let key = (task.to_string(), field_path.to_string());
        if let Some(action) = self.email_decisions.get(&key) {
            return *action;
        }
        let labels: Vec<String> = EmailAction::CHOICES
            .iter()
            .map(|action| action.label().to_string())
            .collect();
        let prompt = format!(
            "Email address found in '{field_path}' (task {task}). How should it be handled?"
        );
        let action = EmailAction::CHOICES[self.decide(&prompt, &labels)];
        debug!(task, field = field_path, action = ?action, "email decision");
        self.email_decisions.insert(key, action);
        action
    }

    pub fn into_parts(self) -> (MappingStore, IssueCollector) {
        (self.mapping, self.issues)
    }
}
