//! Setup dialogue: language → level → time → email.
//!
//! [`advance`] is a pure transition function: it takes the current session and
//! one input and returns the next session (or `None` when the dialogue is over),
//! the reply to send, and at most one side effect for the caller to execute.
//! Invalid input keeps the session where it is and re-prompts.

use wordnest_core::types::{DeliveryTime, Language, Level, ReplyMarkup, UserProfile};

/// Stage of an in-progress dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingLanguage,
    AwaitingLevel,
    AwaitingTime,
    AwaitingEmail,
}

/// An in-progress dialogue with the answers collected so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueSession {
    AwaitingLanguage,
    AwaitingLevel {
        language: Language,
    },
    AwaitingTime {
        language: Language,
        level: Level,
    },
    AwaitingEmail {
        language: Language,
        level: Level,
        time: DeliveryTime,
    },
}

impl DialogueSession {
    pub fn stage(&self) -> Stage {
        match self {
            DialogueSession::AwaitingLanguage => Stage::AwaitingLanguage,
            DialogueSession::AwaitingLevel { .. } => Stage::AwaitingLevel,
            DialogueSession::AwaitingTime { .. } => Stage::AwaitingTime,
            DialogueSession::AwaitingEmail { .. } => Stage::AwaitingEmail,
        }
    }
}

/// One inbound message, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Start,
    Cancel,
    Text(&'a str),
}

impl<'a> Input<'a> {
    /// Recognise `/start` and `/cancel`, including the `/cmd@botname` form.
    pub fn parse(text: &'a str) -> Self {
        let trimmed = text.trim();
        let command = trimmed
            .split_whitespace()
            .next()
            .and_then(|word| word.strip_prefix('/'))
            .map(|cmd| cmd.split('@').next().unwrap_or(cmd));
        match command {
            Some("start") => Input::Start,
            Some("cancel") => Input::Cancel,
            _ => Input::Text(trimmed),
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Persist this profile and arm its daily timer.
    Commit(UserProfile),
    /// Stop delivery for this learner.
    Cancel,
}

/// Text and keyboard to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: ReplyMarkup,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: ReplyMarkup::None,
        }
    }

    fn choices(text: impl Into<String>, choices: &[&str]) -> Self {
        Self {
            text: text.into(),
            markup: ReplyMarkup::Choices(choices.iter().map(|c| c.to_string()).collect()),
        }
    }

    fn removing_keyboard(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markup: ReplyMarkup::Remove,
        }
    }
}

/// Result of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// `None` means no dialogue is in progress afterwards.
    pub session: Option<DialogueSession>,
    pub reply: Reply,
    pub effect: Option<Effect>,
}

/// Which optional steps the dialogue includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogueOptions {
    pub capture_email: bool,
}

impl Default for DialogueOptions {
    fn default() -> Self {
        Self { capture_email: true }
    }
}

fn language_choices() -> Vec<&'static str> {
    Language::ALL.iter().map(Language::as_str).collect()
}

fn level_choices() -> Vec<&'static str> {
    Level::ALL.iter().map(Level::as_str).collect()
}

fn stay(session: DialogueSession, reply: Reply) -> Transition {
    Transition {
        session: Some(session),
        reply,
        effect: None,
    }
}

fn finish(profile: UserProfile) -> Transition {
    let reply = Reply::removing_keyboard(format!(
        "Great! You will get a daily word at {}.\nUse /cancel to stop notifications.",
        profile.time
    ));
    Transition {
        session: None,
        reply,
        effect: Some(Effect::Commit(profile)),
    }
}

/// Advance the dialogue by one input.
pub fn advance(
    session: Option<DialogueSession>,
    input: Input<'_>,
    options: &DialogueOptions,
) -> Transition {
    let text = match input {
        Input::Start => {
            return stay(
                DialogueSession::AwaitingLanguage,
                Reply::choices("Please choose your language:", &language_choices()),
            );
        }
        Input::Cancel => {
            return Transition {
                session: None,
                reply: Reply::removing_keyboard("Notifications canceled. Use /start to begin again."),
                effect: Some(Effect::Cancel),
            };
        }
        Input::Text(text) => text,
    };

    let Some(session) = session else {
        return Transition {
            session: None,
            reply: Reply::plain("Use /start to set up your daily word."),
            effect: None,
        };
    };

    match session {
        DialogueSession::AwaitingLanguage => match text.parse::<Language>() {
            Ok(language) => stay(
                DialogueSession::AwaitingLevel { language },
                Reply::choices(
                    format!("Selected language: {language}\nPlease choose your level:"),
                    &level_choices(),
                ),
            ),
            Err(()) => stay(
                session,
                Reply::choices("Please choose a valid language.", &language_choices()),
            ),
        },

        DialogueSession::AwaitingLevel { language } => match text.parse::<Level>() {
            Ok(level) => stay(
                DialogueSession::AwaitingTime { language, level },
                Reply::removing_keyboard(
                    "At what time do you want to receive the daily word? Send it as HH:MM (24-hour), for example 09:00.",
                ),
            ),
            Err(()) => stay(
                session,
                Reply::choices("Please choose a valid level.", &level_choices()),
            ),
        },

        DialogueSession::AwaitingTime { language, level } => match DeliveryTime::parse(text) {
            Some(time) if options.capture_email => stay(
                DialogueSession::AwaitingEmail {
                    language,
                    level,
                    time,
                },
                Reply::plain("Please send your email address:"),
            ),
            Some(time) => finish(UserProfile::new(language, level, time, String::new())),
            None => stay(
                session,
                Reply::plain("Please send a time between 00:00 and 23:59 as HH:MM, for example 09:00."),
            ),
        },

        DialogueSession::AwaitingEmail {
            language,
            level,
            time,
        } => {
            if text.is_empty() {
                return stay(session, Reply::plain("Please send your email address:"));
            }
            finish(UserProfile::new(language, level, time, text.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> DialogueOptions {
        DialogueOptions::default()
    }

    /// Feed a sequence of messages starting from no session.
    fn run(inputs: &[&str], options: &DialogueOptions) -> (Option<DialogueSession>, Vec<Transition>) {
        let mut session = None;
        let mut transitions = Vec::new();
        for text in inputs {
            let t = advance(session.take(), Input::parse(text), options);
            session = t.session.clone();
            transitions.push(t);
        }
        (session, transitions)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Input::parse("/start"), Input::Start);
        assert_eq!(Input::parse("  /start@WordNestBot "), Input::Start);
        assert_eq!(Input::parse("/cancel"), Input::Cancel);
        assert_eq!(Input::parse("/help"), Input::Text("/help"));
        assert_eq!(Input::parse(" English "), Input::Text("English"));
    }

    #[test]
    fn test_full_dialogue_commits_profile() {
        let (session, ts) = run(&["/start", "English", "A1", "09:00", "a@b.com"], &opts());
        assert!(session.is_none());

        let stages: Vec<_> = ts[..4]
            .iter()
            .map(|t| t.session.as_ref().map(DialogueSession::stage))
            .collect();
        assert_eq!(
            stages,
            [
                Some(Stage::AwaitingLanguage),
                Some(Stage::AwaitingLevel),
                Some(Stage::AwaitingTime),
                Some(Stage::AwaitingEmail),
            ]
        );

        let expected = UserProfile {
            language: Language::English,
            level: Level::A1,
            time: DeliveryTime::new(9, 0).unwrap(),
            email: "a@b.com".into(),
            cursor: 0,
            active: true,
        };
        assert_eq!(ts[4].effect, Some(Effect::Commit(expected)));
        assert!(ts[4].reply.text.contains("09:00"));
        assert!(ts[..4].iter().all(|t| t.effect.is_none()));
    }

    #[test]
    fn test_start_offers_language_keyboard() {
        let t = advance(None, Input::Start, &opts());
        assert_eq!(
            t.reply.markup,
            ReplyMarkup::Choices(vec!["English".into(), "French".into()])
        );
    }

    #[test]
    fn test_invalid_input_keeps_stage_and_writes_nothing() {
        let cases: [(&[&str], &str, Stage); 4] = [
            (&["/start"], "German", Stage::AwaitingLanguage),
            (&["/start", "French"], "C2", Stage::AwaitingLevel),
            (&["/start", "French", "A1"], "25:00", Stage::AwaitingTime),
            (&["/start", "French", "A1"], "9", Stage::AwaitingTime),
        ];
        for (prefix, bad, stage) in cases {
            let (session, _) = run(prefix, &opts());
            let before = session.clone();
            let t = advance(session, Input::Text(bad), &opts());
            assert_eq!(t.session, before, "input {bad:?}");
            assert_eq!(t.session.as_ref().map(DialogueSession::stage), Some(stage));
            assert!(t.effect.is_none());
        }
    }

    #[test]
    fn test_blank_email_reprompts() {
        let (session, _) = run(&["/start", "English", "A2", "07:30"], &opts());
        let t = advance(session, Input::Text(""), &opts());
        assert_eq!(t.session.as_ref().map(DialogueSession::stage), Some(Stage::AwaitingEmail));
        assert!(t.effect.is_none());
    }

    #[test]
    fn test_email_step_skipped_when_disabled() {
        let options = DialogueOptions { capture_email: false };
        let (session, ts) = run(&["/start", "French", "A1", "18:45"], &options);
        assert!(session.is_none());
        match &ts[3].effect {
            Some(Effect::Commit(p)) => {
                assert_eq!(p.time, DeliveryTime::new(18, 45).unwrap());
                assert!(p.email.is_empty());
            }
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_from_any_stage() {
        let prefixes: [&[&str]; 3] = [&[], &["/start"], &["/start", "English", "B1"]];
        for prefix in prefixes {
            let (session, _) = run(prefix, &opts());
            let t = advance(session, Input::Cancel, &opts());
            assert!(t.session.is_none());
            assert_eq!(t.effect, Some(Effect::Cancel));
            assert_eq!(t.reply.markup, ReplyMarkup::Remove);
        }
    }

    #[test]
    fn test_restart_discards_partial_answers() {
        let (session, _) = run(&["/start", "English", "B2"], &opts());
        let t = advance(session, Input::Start, &opts());
        assert_eq!(t.session, Some(DialogueSession::AwaitingLanguage));
    }

    #[test]
    fn test_text_without_session_hints_start() {
        let t = advance(None, Input::Text("hello"), &opts());
        assert!(t.session.is_none());
        assert!(t.effect.is_none());
        assert!(t.reply.text.contains("/start"));
    }
}
