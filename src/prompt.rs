/*!

Prompts.

Operations that may need the user's consent (unlocking, creating a
collection, deleting things) answer either with their result or with
the path of a prompt object. A prompt goes through these states:

- issued: its path came back from some call;
- waiting: the client called `Prompt.Prompt` (or `Prompt.Dismiss`)
  and is waiting for the `Completed` signal;
- completed: the signal arrived, either accepted with a result or
  dismissed.

A completed prompt is consumed. Each connection keeps a table of the
prompt paths it is waiting on, and a second completion on a path that
is already waiting is refused.

*/

use std::collections::HashSet;
use std::sync::Mutex;

use dbus::Path;
use dbus::arg::{ArgType, RefArg, Variant};
use dbus::message::MatchRule;
use log::debug;

use crate::errors::{Error, Result, decode_error, protocol_error};
use crate::service::SecretService;
use crate::ss::{NO_OBJECT, SS_DBUS_NAME, SS_PROMPT_IFACE};
use crate::transport::{Subscription, Transport, method_call};

/// The answer to an operation that may need a prompt.
#[derive(Debug)]
pub enum PromptOr<'a, T> {
    /// The operation finished without prompting.
    Direct(T),
    /// The operation finishes when this prompt completes.
    NeedsPrompt(Prompt<'a>),
}

/// How a prompt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Accepted, with the object paths the prompt returned (if any).
    Completed(Vec<Path<'static>>),
    Dismissed,
}

impl PromptOutcome {
    pub fn is_dismissed(&self) -> bool {
        matches!(self, PromptOutcome::Dismissed)
    }

    /// The returned paths, or [Error::PromptDismissed].
    pub fn into_result(self) -> Result<Vec<Path<'static>>> {
        match self {
            PromptOutcome::Completed(paths) => Ok(paths),
            PromptOutcome::Dismissed => Err(Error::PromptDismissed),
        }
    }
}

/// A pending prompt on the service.
#[derive(Debug)]
pub struct Prompt<'a> {
    service: &'a SecretService,
    path: Path<'static>,
}

impl<'a> Prompt<'a> {
    /// Wrap a prompt path returned by the service; the root path
    /// means "no prompt".
    pub(crate) fn from_path(service: &'a SecretService, path: Path<'_>) -> Option<Self> {
        if &*path == NO_OBJECT {
            None
        } else {
            Some(Prompt {
                service,
                path: path.into_static(),
            })
        }
    }

    pub fn path(&self) -> &Path<'static> {
        &self.path
    }

    /// Show the prompt and wait for the user to finish with it.
    pub fn complete(self) -> Result<PromptOutcome> {
        let window_id = self.service.settings().window_id.clone();
        self.service.prompts().drive(
            self.service.transport(),
            &self.path,
            PromptAction::Prompt(&window_id),
        )
    }

    /// Withdraw the prompt. The service still reports completion,
    /// which is returned here (normally [PromptOutcome::Dismissed]).
    pub fn dismiss(self) -> Result<PromptOutcome> {
        self.service
            .prompts()
            .drive(self.service.transport(), &self.path, PromptAction::Dismiss)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PromptAction<'w> {
    Prompt(&'w str),
    Dismiss,
}

/// Drives prompts to completion for one connection.
#[derive(Debug, Default)]
pub(crate) struct PromptCompletor {
    waiting: Mutex<HashSet<Path<'static>>>,
}

/// Marks a prompt path as waiting until dropped.
struct Waiting<'c> {
    completor: &'c PromptCompletor,
    path: Path<'static>,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.completor
            .waiting
            .lock()
            .expect("Mutex failure in prompt completor: please report a bug")
            .remove(&self.path);
    }
}

impl PromptCompletor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn start_waiting(&self, path: &Path<'static>) -> Result<Waiting<'_>> {
        let mut waiting = self
            .waiting
            .lock()
            .expect("Mutex failure in prompt completor: please report a bug");
        if !waiting.insert(path.clone()) {
            return Err(Error::PromptInFlight(path.to_string()));
        }
        Ok(Waiting {
            completor: self,
            path: path.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn is_waiting(&self, path: &Path<'static>) -> bool {
        self.waiting
            .lock()
            .expect("Mutex failure in prompt completor: please report a bug")
            .contains(path)
    }

    pub(crate) fn drive(
        &self,
        transport: &dyn Transport,
        path: &Path<'static>,
        action: PromptAction<'_>,
    ) -> Result<PromptOutcome> {
        let _waiting = self.start_waiting(path)?;
        // subscribe before acting so the signal can't be missed
        let rule = MatchRule::new_signal(SS_PROMPT_IFACE, "Completed").with_path(path.clone());
        let subscription = transport.subscribe(rule).map_err(decode_error)?;
        let outcome = act_and_wait(transport, &subscription, path, action);
        if let Err(e) = transport.unsubscribe(subscription) {
            debug!("could not drop subscription for prompt {path}: {e}");
        }
        outcome
    }
}

fn act_and_wait(
    transport: &dyn Transport,
    subscription: &Subscription,
    path: &Path<'static>,
    action: PromptAction<'_>,
) -> Result<PromptOutcome> {
    let msg = match action {
        PromptAction::Prompt(window_id) => {
            method_call(SS_DBUS_NAME, path, SS_PROMPT_IFACE, "Prompt")?.append1(window_id)
        }
        PromptAction::Dismiss => method_call(SS_DBUS_NAME, path, SS_PROMPT_IFACE, "Dismiss")?,
    };
    transport.call(msg).map_err(decode_error)?;
    debug!("waiting on prompt {path}");
    loop {
        let signal = transport.next_signal(subscription).map_err(decode_error)?;
        let from_prompt = signal.path().is_some_and(|p| &*p == &**path);
        if !from_prompt {
            continue;
        }
        let (dismissed, result): (bool, Variant<Box<dyn RefArg>>) =
            signal.read2().map_err(protocol_error)?;
        debug!("prompt {path} completed (dismissed: {dismissed})");
        return Ok(if dismissed {
            PromptOutcome::Dismissed
        } else {
            PromptOutcome::Completed(result_paths(&*result.0))
        });
    }
}

/// Collect the object paths in a prompt result, which may be a single
/// path, an array of paths, or nothing useful at all.
fn result_paths(arg: &dyn RefArg) -> Vec<Path<'static>> {
    match arg.arg_type() {
        ArgType::ObjectPath => arg
            .as_str()
            .filter(|p| *p != NO_OBJECT)
            .and_then(|p| Path::new(p.to_string()).ok())
            .into_iter()
            .collect(),
        ArgType::Array | ArgType::Variant => arg
            .as_iter()
            .map(|items| items.flat_map(result_paths).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}
