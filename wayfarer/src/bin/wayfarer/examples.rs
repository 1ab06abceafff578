use crate::commands::{audit, config, purge, stats};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "config",
            groups: config::EXAMPLES,
        },
        CommandExample {
            name: "stats",
            groups: stats::EXAMPLES,
        },
        CommandExample {
            name: "purge",
            groups: purge::EXAMPLES,
        },
        CommandExample {
            name: "audit",
            groups: audit::EXAMPLES,
        },
    ]
}
