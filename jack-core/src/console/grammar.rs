#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the bench console.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens to build structured
//! command values.

use super::catalog::{self, ChoiceBranch, ChoiceTag, CommandTag, DefaultChoice, Node, ValueSpec};
use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use crate::state::PoleType;

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Plug(PoleType),
    Unplug,
    Button(ButtonCommand),
    Wait(Duration),
    Status,
    Log,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonCommand {
    Press,
    Release,
    /// Press, hold for the duration, release.
    Tap(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        if buffer
            .push(Token {
                kind: record.token,
                lexeme,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        if buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let mut rest = tokens.as_slice();
    let command = match command().parse_next(&mut rest) {
        Ok(command) => command,
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => {
            return Err(ParseError::Grammar(err));
        }
        Err(ErrMode::Incomplete(_)) => {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "token",
                rest.first(),
            )));
        }
    };

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let snapshot = *input;
        let command_token = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;

        if let Some(spec) = catalog::find(command_token.lexeme) {
            let mut state = CommandState::new(spec.tag);
            parse_node(spec.grammar, input, &mut state)?;
            state.finish()
        } else {
            *input = snapshot;
            Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&command_token),
            )))
        }
    }
}

fn parse_node<'src, 'slice>(
    node: &'static Node,
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match node {
        Node::End => Ok(()),
        Node::OptionalChoice { choices, default } => {
            parse_optional_choice(input, choices, *default, state)
        }
        Node::Argument { value, next } => {
            let value = parse_value(input, *value)?;
            state.apply_argument(value);
            parse_node(next, input, state)
        }
        Node::Topic { next, .. } => {
            parse_topic(input, state)?;
            parse_node(next, input, state)
        }
    }
}

fn parse_optional_choice<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    choices: &'static [ChoiceBranch],
    default: Option<DefaultChoice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            if let Some(branch) = find_choice(choices, token.lexeme) {
                *input = rest;
                let value = parse_value(input, branch.value)?;
                state.apply_choice(branch.tag, value)?;
                parse_node(branch.next, input, state)
            } else {
                Err(ErrMode::Backtrack(GrammarError::unexpected(
                    choice_expected_label(choices),
                    Some(token),
                )))
            }
        }
        Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
            GrammarError::unexpected(choice_expected_label(choices), Some(token)),
        )),
        _ => match default {
            Some(default_choice) => {
                state.apply_choice(default_choice.tag, ChoiceValue::None)?;
                parse_node(default_choice.next, input, state)
            }
            None => Ok(()),
        },
    }
}

fn parse_topic<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    state: &mut CommandState<'src>,
) -> Result<(), ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match input.split_first() {
        Some((token, rest)) if token.kind == TokenKind::Ident => {
            state.set_topic(token.lexeme);
            *input = rest;
            Ok(())
        }
        Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
            GrammarError::unexpected("identifier", Some(token)),
        )),
        _ => Ok(()),
    }
}

fn parse_value<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    spec: ValueSpec,
) -> Result<ChoiceValue, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    match spec {
        ValueSpec::None => Ok(ChoiceValue::None),
        ValueSpec::Duration => {
            let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
            let duration = parse_duration(&token).map_err(ErrMode::Cut)?;
            Ok(ChoiceValue::Duration(duration))
        }
    }
}

fn find_choice(choices: &'static [ChoiceBranch], lexeme: &str) -> Option<&'static ChoiceBranch> {
    choices
        .iter()
        .find(|choice| choice.keyword.eq_ignore_ascii_case(lexeme))
}

fn choice_expected_label(choices: &'static [ChoiceBranch]) -> &'static str {
    choices.first().map_or("keyword", |choice| choice.keyword)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChoiceValue {
    None,
    Duration(Duration),
}

enum CommandState<'a> {
    Plug { pole: Option<PoleType> },
    Unplug,
    Button { action: Option<ButtonCommand> },
    Wait { duration: Option<Duration> },
    Status,
    Log,
    Help { topic: Option<&'a str> },
}

impl<'a> CommandState<'a> {
    fn new(tag: CommandTag) -> Self {
        match tag {
            CommandTag::Plug => CommandState::Plug { pole: None },
            CommandTag::Unplug => CommandState::Unplug,
            CommandTag::Button => CommandState::Button { action: None },
            CommandTag::Wait => CommandState::Wait { duration: None },
            CommandTag::Status => CommandState::Status,
            CommandTag::Log => CommandState::Log,
            CommandTag::Help => CommandState::Help { topic: None },
        }
    }

    fn apply_choice(
        &mut self,
        tag: ChoiceTag,
        value: ChoiceValue,
    ) -> Result<(), ErrMode<GrammarError<'a>>> {
        match (self, tag, value) {
            (CommandState::Plug { pole }, ChoiceTag::PlugHeadset, _) => {
                *pole = Some(PoleType::FourPole);
                Ok(())
            }
            (CommandState::Plug { pole }, ChoiceTag::PlugHeadphones, _) => {
                *pole = Some(PoleType::ThreePole);
                Ok(())
            }
            (CommandState::Button { action }, ChoiceTag::ButtonPress, _) => {
                *action = Some(ButtonCommand::Press);
                Ok(())
            }
            (CommandState::Button { action }, ChoiceTag::ButtonRelease, _) => {
                *action = Some(ButtonCommand::Release);
                Ok(())
            }
            (
                CommandState::Button { action },
                ChoiceTag::ButtonTap,
                ChoiceValue::Duration(hold),
            ) => {
                *action = Some(ButtonCommand::Tap(hold));
                Ok(())
            }
            _ => Err(ErrMode::Backtrack(GrammarError::unexpected("choice", None))),
        }
    }

    fn apply_argument(&mut self, value: ChoiceValue) {
        if let (CommandState::Wait { duration }, ChoiceValue::Duration(value)) = (self, value) {
            *duration = Some(value);
        }
    }

    fn set_topic(&mut self, topic: &'a str) {
        if let CommandState::Help { topic: slot } = self {
            *slot = Some(topic);
        }
    }

    fn finish(self) -> Result<Command<'a>, ErrMode<GrammarError<'a>>> {
        match self {
            CommandState::Plug { pole: Some(pole) } => Ok(Command::Plug(pole)),
            CommandState::Unplug => Ok(Command::Unplug),
            CommandState::Button {
                action: Some(action),
            } => Ok(Command::Button(action)),
            CommandState::Wait {
                duration: Some(duration),
            } => Ok(Command::Wait(duration)),
            CommandState::Status => Ok(Command::Status),
            CommandState::Log => Ok(Command::Log),
            CommandState::Help { topic } => Ok(Command::Help(HelpCommand { topic })),
            CommandState::Plug { pole: None } => Err(ErrMode::Backtrack(
                GrammarError::unexpected("plug argument", None),
            )),
            CommandState::Button { action: None } => Err(ErrMode::Backtrack(
                GrammarError::unexpected("press, release or tap", None),
            )),
            CommandState::Wait { duration: None } => Err(ErrMode::Backtrack(
                GrammarError::unexpected("duration", None),
            )),
        }
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}
