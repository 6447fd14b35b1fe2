//! Bench console grammar expressed as an applicative AST.
//!
//! The parser and the `help` renderer interpret the same structure, keeping
//! keywords, defaults, and value layouts in sync.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Plug,
    Unplug,
    Button,
    Wait,
    Status,
    Log,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    PlugHeadset,
    PlugHeadphones,
    ButtonPress,
    ButtonRelease,
    ButtonTap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    None,
    Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HelpTopics {
    None,
    Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub help: HelpTopics,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    OptionalChoice {
        choices: &'static [ChoiceBranch],
        default: Option<DefaultChoice>,
    },
    Argument {
        value: ValueSpec,
        next: &'static Node,
    },
    Topic {
        topics: HelpTopics,
        next: &'static Node,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
    pub value: ValueSpec,
    pub next: &'static Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultChoice {
    pub tag: ChoiceTag,
    pub next: &'static Node,
}

const END: Node = Node::End;

const PLUG_CHOICES: [ChoiceBranch; 2] = [
    ChoiceBranch {
        keyword: "headset",
        tag: ChoiceTag::PlugHeadset,
        value: ValueSpec::None,
        next: &END,
    },
    ChoiceBranch {
        keyword: "headphones",
        tag: ChoiceTag::PlugHeadphones,
        value: ValueSpec::None,
        next: &END,
    },
];

const PLUG_GRAMMAR: Node = Node::OptionalChoice {
    choices: &PLUG_CHOICES,
    default: Some(DefaultChoice {
        tag: ChoiceTag::PlugHeadset,
        next: &END,
    }),
};

const BUTTON_CHOICES: [ChoiceBranch; 3] = [
    ChoiceBranch {
        keyword: "press",
        tag: ChoiceTag::ButtonPress,
        value: ValueSpec::None,
        next: &END,
    },
    ChoiceBranch {
        keyword: "release",
        tag: ChoiceTag::ButtonRelease,
        value: ValueSpec::None,
        next: &END,
    },
    ChoiceBranch {
        keyword: "tap",
        tag: ChoiceTag::ButtonTap,
        value: ValueSpec::Duration,
        next: &END,
    },
];

const BUTTON_GRAMMAR: Node = Node::OptionalChoice {
    choices: &BUTTON_CHOICES,
    default: None,
};

const WAIT_GRAMMAR: Node = Node::Argument {
    value: ValueSpec::Duration,
    next: &END,
};

const HELP_GRAMMAR: Node = Node::Topic {
    topics: HelpTopics::Commands,
    next: &END,
};

const COMMANDS: [CommandSpec; 7] = [
    CommandSpec {
        name: "plug",
        tag: CommandTag::Plug,
        grammar: &PLUG_GRAMMAR,
        help: HelpTopics::None,
        summary: "plug [headset|headphones]  insert a 4-pole (default) or 3-pole plug",
    },
    CommandSpec {
        name: "unplug",
        tag: CommandTag::Unplug,
        grammar: &END,
        help: HelpTopics::None,
        summary: "unplug                     pull the plug out",
    },
    CommandSpec {
        name: "button",
        tag: CommandTag::Button,
        grammar: &BUTTON_GRAMMAR,
        help: HelpTopics::None,
        summary: "button press|release|tap <duration>  drive the send/end button",
    },
    CommandSpec {
        name: "wait",
        tag: CommandTag::Wait,
        grammar: &WAIT_GRAMMAR,
        help: HelpTopics::None,
        summary: "wait <duration>            advance the virtual clock",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        help: HelpTopics::None,
        summary: "status                     show detector and line state",
    },
    CommandSpec {
        name: "log",
        tag: CommandTag::Log,
        grammar: &END,
        help: HelpTopics::None,
        summary: "log                        replay recorded jack events",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        help: HelpTopics::Commands,
        summary: "help [command]             list commands",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Looks up a command by its tag.
#[must_use]
pub fn command(tag: CommandTag) -> &'static CommandSpec {
    match tag {
        CommandTag::Plug => &COMMANDS[0],
        CommandTag::Unplug => &COMMANDS[1],
        CommandTag::Button => &COMMANDS[2],
        CommandTag::Wait => &COMMANDS[3],
        CommandTag::Status => &COMMANDS[4],
        CommandTag::Log => &COMMANDS[5],
        CommandTag::Help => &COMMANDS[6],
    }
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
