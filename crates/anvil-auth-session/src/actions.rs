//! Execution of configured actions.

use anvil_auth_core::{Action, DialogHost, Identity};
use tracing::debug;

/// Run `actions` for `identity`, substituting `{player}`.
pub fn run_actions(host: &mut dyn DialogHost, identity: &Identity, actions: &[Action]) {
    for action in actions {
        let text = action.render(&identity.name);
        debug!(user = %identity.id, action = %action, "Running action");
        match action {
            Action::Kick(_) => host.kick(identity.id, &text),
            Action::Message(_) => host.send_message(identity.id, &text),
            Action::Command(_) => host.dispatch_command(&text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDialogHost;

    #[test]
    fn each_kind_reaches_the_host() {
        let identity = Identity::named("alice");
        let mut host = MockDialogHost::new().with_online(identity.id);
        let actions = vec![
            Action::Message("hi {player}".into()),
            Action::Command("spawn {player}".into()),
            Action::Kick("bye".into()),
        ];

        run_actions(&mut host, &identity, &actions);

        assert_eq!(host.messages_for(identity.id), vec!["hi alice"]);
        assert_eq!(host.commands(), &["spawn alice".to_string()]);
        assert_eq!(host.kicks(), &[(identity.id, "bye".to_string())]);
    }
}
