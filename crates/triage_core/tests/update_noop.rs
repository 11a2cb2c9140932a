use triage_core::{update, AppState, Job, Msg};

#[test]
fn update_is_noop() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn tick_leaves_populated_state_untouched() {
    let (state, _) = update(AppState::new(), Msg::AddJob(Job::new(1, "Re: invoice", 4)));
    let (next, effects) = update(state.clone(), Msg::Tick);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
