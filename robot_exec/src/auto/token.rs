//! Script vocabulary and statement parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A script command word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Start,
    Finish,
    Mode,
    Debug,
    Message,
    Begin,
    End,
    Delay,
    Move,
    MMove,
    Turn,
    Straight,
    Search,
    SearchBall,
    RedSense,
    SetAngle,
    Intake,
    StopIntake,
    Ride,
    Lowest,
    AfterShoot,
    Throwup,
    Aim,
    Shoot,
    Short,
    Lower,
    Raise,
    TailDown,
    TailUp,
    StartDriveFwd,
    StartDriveBck,
    StopDrive,
    JawOpen,
    JawClose,
}

/// Problems with a statement's parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("Missing parameter: {0}")]
    Missing(&'static str),

    #[error("Parameter {0} is not a number: {1:?}")]
    NotNumeric(&'static str, String),
}

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const VOCABULARY: &[(&str, Token)] = &[
    ("START", Token::Start),
    ("FINISH", Token::Finish),
    ("MODE", Token::Mode),
    ("DEBUG", Token::Debug),
    ("MESSAGE", Token::Message),
    ("BEGIN", Token::Begin),
    ("END", Token::End),
    ("DELAY", Token::Delay),
    ("MOVE", Token::Move),
    ("MMOVE", Token::MMove),
    ("TURN", Token::Turn),
    ("STRAIGHT", Token::Straight),
    ("SEARCH", Token::Search),
    ("SEARCHBALL", Token::SearchBall),
    ("REDSENSE", Token::RedSense),
    ("SETANGLE", Token::SetAngle),
    ("INTAKE", Token::Intake),
    ("STOPINTAKE", Token::StopIntake),
    ("RIDE", Token::Ride),
    ("LOWEST", Token::Lowest),
    ("AFTERSHOOT", Token::AfterShoot),
    ("THROWUP", Token::Throwup),
    ("AIM", Token::Aim),
    ("SHOOT", Token::Shoot),
    ("SHORT", Token::Short),
    ("LOWER", Token::Lower),
    ("RAISE", Token::Raise),
    ("TAILDOWN", Token::TailDown),
    ("TAILUP", Token::TailUp),
    ("STARTDRIVEFWD", Token::StartDriveFwd),
    ("STARTDRIVEBCK", Token::StartDriveBck),
    ("STOPDRIVE", Token::StopDrive),
    ("JAWOPEN", Token::JawOpen),
    ("JAWCLOSE", Token::JawClose),
];

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the command a statement's first word selects.
///
/// A vocabulary word matches if it is a case-sensitive prefix of `word`. The longest match wins,
/// so `STARTDRIVEFWD` selects [`Token::StartDriveFwd`] rather than [`Token::Start`].
pub fn match_token(word: &str) -> Option<Token> {
    VOCABULARY
        .iter()
        .filter(|(w, _)| word.starts_with(w))
        .max_by_key(|(w, _)| w.len())
        .map(|(_, t)| *t)
}

/// Parse the required numeric parameter at `idx`.
pub fn number(params: &[&str], idx: usize, name: &'static str) -> Result<f64, ParamError> {
    match params.get(idx) {
        Some(p) => parse(p, name),
        None => Err(ParamError::Missing(name)),
    }
}

/// Parse the optional numeric parameter at `idx`, using `default` if it is absent.
pub fn number_or(
    params: &[&str],
    idx: usize,
    name: &'static str,
    default: f64,
) -> Result<f64, ParamError> {
    match params.get(idx) {
        Some(p) => parse(p, name),
        None => Ok(default),
    }
}

fn parse(param: &str, name: &'static str) -> Result<f64, ParamError> {
    match param.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParamError::NotNumeric(name, param.to_string())),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
