use log::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Settings for the question answering agent, read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Lets the agent run SQL against the uploaded table. Off unless the operator opts in.
    pub allow_code_execution: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            allow_code_execution: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_key: non_empty("OPENAI_API_KEY"),
            base_url: non_empty("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or(defaults.base_url),
            model: non_empty("OPENAI_MODEL").unwrap_or(defaults.model),
            allow_code_execution: non_empty("CSV_EXPLORER_ALLOW_CODE_EXECUTION")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    /// Tells the user whether the agent can compute over the table or only read a preview.
    pub fn code_execution_notice(&self) -> &'static str {
        if self.allow_code_execution {
            "Code execution is ON: the agent may run SQL queries against the whole table."
        } else {
            "Code execution is OFF (the default): the agent only sees the schema and the first \
             rows. Set CSV_EXPLORER_ALLOW_CODE_EXECUTION=1 to let it run SQL over the table."
        }
    }
}

/// Loads `.env` from the working directory if present.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => debug!("loaded environment from {}", path.display()),
        Err(e) => debug!("no .env loaded: {e}"),
    }
}
