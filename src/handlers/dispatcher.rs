use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::handlers::command::{CommandContext, CommandError, CommandLine, CommandResult};
use crate::state::AppState;
use crate::telegram::types::{Message, Update, UpdateKind};
use crate::utils::timing::{complete_command_timer, start_command_timer};

pub type CommandFuture<'a> = Pin<Box<dyn Future<Output = CommandResult> + Send + 'a>>;
pub type CommandFn = for<'a> fn(&'a CommandContext) -> CommandFuture<'a>;

#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
    pub handler: CommandFn,
}

/// A set of commands sharing one permission check.
pub trait CommandGroup: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_execute(&self, ctx: &CommandContext) -> bool;

    fn commands(&self) -> Vec<CommandSpec>;

    /// Handler for messages that are not commands.
    fn on_text(&self) -> Option<CommandFn> {
        None
    }

    /// Handler for command names no group registered.
    fn on_unknown(&self) -> Option<CommandFn> {
        None
    }
}

struct Route {
    group: usize,
    spec: CommandSpec,
}

#[derive(Default)]
pub struct Dispatcher {
    groups: Vec<Box<dyn CommandGroup>>,
    routes: HashMap<&'static str, Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a group's commands. The first registration of a name wins.
    pub fn register(&mut self, group: Box<dyn CommandGroup>) -> &mut Self {
        let index = self.groups.len();
        for spec in group.commands() {
            if let Some(existing) = self.routes.get(spec.name) {
                warn!(
                    "Command /{} from group {} is already registered by {}",
                    spec.name,
                    group.name(),
                    self.groups[existing.group].name()
                );
                continue;
            }
            self.routes.insert(spec.name, Route { group: index, spec });
        }
        self.groups.push(group);
        self
    }

    /// Routes one update to its handler and returns what the handler sent.
    ///
    /// Messages without a command (stickers and other media included) go
    /// to the text fallback. `Ok(None)` means nothing ran: the update was not
    /// a fresh message or button press, the sender failed the permission
    /// check, or no fallback accepted it.
    pub async fn dispatch(
        &self,
        state: &AppState,
        update: Update,
    ) -> Result<Option<Message>, CommandError> {
        if !matches!(update.kind, UpdateKind::Message | UpdateKind::CallbackQuery(_)) {
            debug!("Ignoring update {} ({:?})", update.update_id, update.kind);
            return Ok(None);
        }

        let command = CommandLine::parse(update.message.content());
        let ctx = CommandContext::new(state.clone(), update, command.clone());

        let Some(command) = command else {
            return match self.fallback(&ctx, |group| group.on_text()) {
                Some(handler) => run_timed(&ctx, "text", handler).await.map(Some),
                None => Ok(None),
            };
        };

        let Some(route) = self.routes.get(command.name.as_str()) else {
            return match self.fallback(&ctx, |group| group.on_unknown()) {
                Some(handler) => run_timed(&ctx, &command.name, handler).await.map(Some),
                None => {
                    debug!("Ignoring unknown command /{}", command.name);
                    Ok(None)
                }
            };
        };

        let group = &self.groups[route.group];
        if !group.can_execute(&ctx) {
            debug!(
                "User {} may not run /{} ({} group)",
                ctx.from_user().id,
                command.name,
                group.name()
            );
            return Ok(None);
        }

        run_timed(&ctx, route.spec.name, route.spec.handler)
            .await
            .map(Some)
    }

    fn fallback<F>(&self, ctx: &CommandContext, pick: F) -> Option<CommandFn>
    where
        F: Fn(&dyn CommandGroup) -> Option<CommandFn>,
    {
        self.groups.iter().find_map(|group| {
            let handler = pick(group.as_ref())?;
            group.can_execute(ctx).then_some(handler)
        })
    }
}

async fn run_timed(ctx: &CommandContext, label: &str, handler: CommandFn) -> CommandResult {
    let mut timer = start_command_timer(label, ctx.message());
    let result = handler(ctx).await;
    match &result {
        Ok(_) => complete_command_timer(&mut timer, "success", None),
        Err(err) => complete_command_timer(&mut timer, "error", Some(err.to_string())),
    }
    result
}
