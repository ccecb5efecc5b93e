use crate::agent::Agent;
use crate::bridge;
use crate::charts::{self, ChartBattery};
use crate::clean::clean;
use crate::config::Settings;
use crate::error::SessionError;
use crate::ingest;
use crate::summary::{self, SummaryReport};
use crate::table::{CleanTable, RawTable, Tabular};
use log::{info, warn};
use std::path::Path;

/// Show/hide flags for the summary and chart panels. Both start hidden.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToggleState {
    show_summary: bool,
    show_charts: bool,
}

impl ToggleState {
    pub fn show_summary(&self) -> bool {
        self.show_summary
    }

    pub fn show_charts(&self) -> bool {
        self.show_charts
    }

    /// Flips the summary flag and returns the new value.
    pub fn toggle_summary(&mut self) -> bool {
        self.show_summary = !self.show_summary;
        self.show_summary
    }

    pub fn toggle_charts(&mut self) -> bool {
        self.show_charts = !self.show_charts;
        self.show_charts
    }
}

/// Everything one user session owns: the cleaned table and the panel toggles.
#[derive(Debug, Default)]
pub struct Session {
    settings: Settings,
    source: Option<String>,
    table: Option<CleanTable>,
    toggles: ToggleState,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn table(&self) -> Option<&CleanTable> {
        self.table.as_ref()
    }

    pub fn toggles(&self) -> ToggleState {
        self.toggles
    }

    pub fn toggle_summary(&mut self) -> bool {
        self.toggles.toggle_summary()
    }

    pub fn toggle_charts(&mut self) -> bool {
        self.toggles.toggle_charts()
    }

    pub fn load_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<&CleanTable, SessionError> {
        let raw = ingest::read_csv_bytes(bytes);
        self.install(name, raw.map_err(SessionError::from))
    }

    pub fn load_path(&mut self, path: &Path) -> Result<&CleanTable, SessionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let raw = ingest::read_csv_path(path);
        self.install(&name, raw.map_err(SessionError::from))
    }

    fn install(
        &mut self,
        name: &str,
        raw: Result<RawTable, SessionError>,
    ) -> Result<&CleanTable, SessionError> {
        self.table = None;
        self.source = None;
        let cleaned = raw.and_then(|raw| clean(raw).map_err(SessionError::from));
        match cleaned {
            Ok(table) => {
                let (rows, cols) = table.shape();
                info!("{name}: {rows} rows, {cols} columns ready");
                self.source = Some(name.to_owned());
                Ok(&*self.table.insert(table))
            }
            Err(e) => {
                warn!("{name}: load failed: {e}");
                Err(e)
            }
        }
    }

    /// Statistics for the summary panel, or `None` while it is hidden.
    pub fn summary(&self) -> Option<Result<SummaryReport, SessionError>> {
        if !self.toggles.show_summary {
            return None;
        }
        let table = self.table.as_ref()?;
        Some(summary::summarize(table).map_err(SessionError::from))
    }

    /// Summary CSV for download, regardless of the panel state.
    pub fn summary_csv(&self) -> Result<Vec<u8>, SessionError> {
        let table = self.table.as_ref().ok_or(SessionError::NoTable)?;
        let report = summary::summarize(table)?;
        Ok(summary::export(&report)?)
    }

    /// Rendered charts, or `None` while the panel is hidden or no numeric column exists.
    pub fn charts(&self) -> Option<ChartBattery> {
        if !self.toggles.show_charts {
            return None;
        }
        let table = self.table.as_ref()?;
        if table.numeric_columns().is_empty() {
            return None;
        }
        Some(charts::generate(table))
    }

    pub fn ask(&self, question: &str) -> Result<String, SessionError> {
        let table = self.table.as_ref().ok_or(SessionError::NoTable)?;
        Ok(bridge::ask(&self.settings, table, question)?)
    }

    pub fn ask_with(&self, agent: &dyn Agent, question: &str) -> Result<String, SessionError> {
        let table = self.table.as_ref().ok_or(SessionError::NoTable)?;
        Ok(bridge::ask_with(agent, table, question)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, ParseError};

    struct Echo;

    impl Agent for Echo {
        fn answer(&self, question: &str, _: &[u8]) -> Result<String, AgentError> {
            Ok(format!("echo: {question}"))
        }
    }

    #[test]
    fn toggles_start_hidden_and_flip() {
        let mut toggles = ToggleState::default();
        assert!(!toggles.show_summary());
        assert!(!toggles.show_charts());
        assert!(toggles.toggle_summary());
        assert!(!toggles.toggle_summary());
        assert!(toggles.toggle_charts());
        assert!(!toggles.show_summary());
    }

    #[test]
    fn panels_hidden_until_toggled() {
        let mut session = Session::default();
        session.load_bytes("a.csv", b"x,y\n1,2\n3,\n").unwrap();
        assert!(session.summary().is_none());
        assert!(session.charts().is_none());
        session.toggle_summary();
        let report = session.summary().unwrap().unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.total_nulls(), 0);
    }

    #[test]
    fn failed_load_drops_previous_table() {
        let mut session = Session::default();
        session.load_bytes("good.csv", b"x\n1\n").unwrap();
        assert_eq!(session.source(), Some("good.csv"));
        let err = session.load_bytes("bad.csv", b"").unwrap_err();
        assert!(matches!(err, SessionError::Parse(ParseError::Empty)));
        assert!(session.table().is_none());
        assert!(session.source().is_none());
    }

    #[test]
    fn asking_without_table_fails() {
        let session = Session::default();
        assert!(matches!(
            session.ask_with(&Echo, "hi"),
            Err(SessionError::NoTable)
        ));
    }

    #[test]
    fn asking_uses_the_agent() {
        let mut session = Session::default();
        session.load_bytes("a.csv", b"x\n1\n").unwrap();
        assert_eq!(session.ask_with(&Echo, "hi").unwrap(), "echo: hi");
    }

    #[test]
    fn summary_download_available_while_hidden() {
        let mut session = Session::default();
        assert!(matches!(session.summary_csv(), Err(SessionError::NoTable)));
        session.load_bytes("a.csv", b"x,label\n1,a\n2,b\n").unwrap();
        let csv = String::from_utf8(session.summary_csv().unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
