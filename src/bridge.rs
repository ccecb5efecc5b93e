use crate::agent::{Agent, OpenAiAgent};
use crate::config::Settings;
use crate::error::AgentError;
use crate::table::CleanTable;
use log::info;

/// Builds a fresh agent from `settings` and asks it `question` about `table`.
pub fn ask(settings: &Settings, table: &CleanTable, question: &str) -> Result<String, AgentError> {
    if question.trim().is_empty() {
        return Err(AgentError::EmptyQuestion);
    }
    let agent = OpenAiAgent::new(settings)?;
    ask_with(&agent, table, question)
}

/// Serializes the cleaned table and forwards it with the question to `agent`.
pub fn ask_with(
    agent: &dyn Agent,
    table: &CleanTable,
    question: &str,
) -> Result<String, AgentError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AgentError::EmptyQuestion);
    }
    let dataset = table
        .to_csv_bytes()
        .map_err(|e| AgentError::Dataset(e.to_string()))?;
    info!("asking agent ({} bytes of CSV)", dataset.len());
    agent.answer(question, &dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::clean;
    use crate::table::RawTable;
    use polars::prelude::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<(String, String)>>,
    }

    impl Agent for Recorder {
        fn answer(&self, question: &str, dataset: &[u8]) -> Result<String, AgentError> {
            let csv = String::from_utf8(dataset.to_vec()).unwrap();
            self.seen.borrow_mut().push((question.to_owned(), csv));
            Ok("42".to_owned())
        }
    }

    struct Failing;

    impl Agent for Failing {
        fn answer(&self, _: &str, _: &[u8]) -> Result<String, AgentError> {
            Err(AgentError::Http(401, "invalid api key".to_owned()))
        }
    }

    fn table() -> CleanTable {
        let df = df!(
            "age" => &[Some(20i64), None, Some(40)],
            "city" => &[Some("Rome"), Some("Rome"), None]
        )
        .unwrap();
        clean(RawTable::new(df)).unwrap()
    }

    #[test]
    fn agent_sees_cleaned_csv() {
        let agent = Recorder::default();
        let answer = ask_with(&agent, &table(), "  mean age?  ").unwrap();
        assert_eq!(answer, "42");
        let seen = agent.seen.borrow();
        assert_eq!(seen[0].0, "mean age?");
        assert_eq!(seen[0].1, "age,city\n20.0,Rome\n30.0,Rome\n40.0,Rome\n");
    }

    #[test]
    fn blank_question_never_reaches_agent() {
        let agent = Recorder::default();
        let err = ask_with(&agent, &table(), "   ").unwrap_err();
        assert!(matches!(err, AgentError::EmptyQuestion));
        assert!(agent.seen.borrow().is_empty());
    }

    #[test]
    fn external_errors_pass_through() {
        let err = ask_with(&Failing, &table(), "anything").unwrap_err();
        assert_eq!(err.to_string(), "HTTP 401: invalid api key");
    }

    #[test]
    fn missing_credential_surfaces() {
        let err = ask(&Settings::default(), &table(), "anything").unwrap_err();
        assert!(matches!(err, AgentError::MissingCredential));
    }
}
