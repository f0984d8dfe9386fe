//! Chat input box logic: command parsing and name autocompletion.

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// What a submitted line of text means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Nothing to do: blank slash commands such as `/` or `/ vote`.
    Empty,
    /// Plain chat text, posted as-is.
    Chat(String),
    Command { name: String, args: Vec<String> },
}

/// Classify a submitted line.
///
/// Text starting with `/` is a command. The token immediately after the
/// slash is its name and the remaining whitespace-separated tokens are its
/// arguments. A slash followed by nothing or by whitespace is ignored.
pub fn parse_input(text: &str) -> Input {
    let Some(rest) = text.strip_prefix('/') else {
        return Input::Chat(text.to_string());
    };
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        return Input::Empty;
    }
    let mut tokens = rest.split_whitespace().map(str::to_string);
    match tokens.next() {
        Some(name) => Input::Command {
            name,
            args: tokens.collect(),
        },
        None => Input::Empty,
    }
}

/// The local commands the session understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/vote <type>`; the argument is validated by the session.
    Vote(Option<String>),
    /// `/me <text>`; posted to the server which echoes it back as an action.
    Me(String),
    Confirm,
    Unknown(String),
}

impl Command {
    pub fn from_parts(name: &str, args: &[String]) -> Self {
        match name {
            "vote" => Command::Vote(args.first().cloned()),
            "me" => Command::Me(args.join(" ")),
            "confirm" => Command::Confirm,
            other => Command::Unknown(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Autocomplete
// ---------------------------------------------------------------------------

/// Keys the input box forwards to [`Autocomplete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Other,
}

/// The last run of non-whitespace characters at the end of `text`.
fn trailing_word(text: &str) -> Option<&str> {
    let start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| !c.is_whitespace())
        .last()
        .map(|(i, _)| i)?;
    Some(&text[start..])
}

fn replace_trailing_word(text: &str, replacement: &str) -> String {
    match trailing_word(text) {
        Some(word) => format!("{}{}", &text[..text.len() - word.len()], replacement),
        None => text.to_string(),
    }
}

/// Tab completion of participant names.
///
/// The first Tab collects every name that starts with the trailing word,
/// in discovery order, and substitutes the first. Each further Tab
/// substitutes the next match, wrapping around. Any other key ends the cycle.
#[derive(Debug, Default, Clone)]
pub struct Autocomplete {
    matches: Vec<String>,
    index: usize,
    active: bool,
}

impl Autocomplete {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cancel(&mut self) {
        self.active = false;
    }

    /// Feed a keystroke. Returns the new input text when a completion applies.
    pub fn on_key<'a>(
        &mut self,
        key: Key,
        text: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Option<String> {
        if key != Key::Tab {
            self.cancel();
            return None;
        }
        if self.active {
            return Some(self.advance(text));
        }

        let term = trailing_word(text)?;
        let matches: Vec<String> = names
            .into_iter()
            .filter(|name| name.starts_with(term))
            .map(str::to_string)
            .collect();
        if matches.is_empty() {
            return None;
        }

        self.matches = matches;
        self.index = 0;
        self.active = true;
        Some(self.advance(text))
    }

    fn advance(&mut self, text: &str) -> String {
        let suggestion = &self.matches[self.index];
        let replaced = replace_trailing_word(text, suggestion);
        self.index = (self.index + 1) % self.matches.len();
        replaced
    }
}
