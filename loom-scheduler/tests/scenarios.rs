use loom_actions::Action;
use loom_base::Config;
use loom_context::{render_resolved, Context};
use loom_hypertext::Address;
use loom_scheduler::Scheduler;
use test_log::test;

fn named(ctx: &Context, name: &str) -> Address {
    ctx.naming().address_of(name).unwrap()
}

#[test]
fn recursion_through_nested_multiplication() {
    let mut scheduler = Scheduler::new(Config::default());
    let root = scheduler.ask_root("What is 351 * 5019?").unwrap();
    let root_answer_promise = root.answer_promise();

    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("What is 300 * 5019?".into()))
        .unwrap()
        .unwrap();
    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("What is 50 * 5019?".into()))
        .unwrap()
        .unwrap();
    let a1 = named(&root, "a1");
    let a2 = named(&root, "a2");

    scheduler
        .resolve_action(&root, Action::Unlock("a1".into()))
        .unwrap();
    let sub1 = scheduler.choose_context_to_advance_promise(a1).unwrap();
    scheduler
        .resolve_action(&sub1, Action::Reply("1505700".into()))
        .unwrap();

    let root = scheduler
        .choose_context_to_advance_promise(root_answer_promise)
        .unwrap();
    scheduler
        .resolve_action(&root, Action::Unlock("a2".into()))
        .unwrap();
    let sub2 = scheduler.choose_context_to_advance_promise(a2).unwrap();
    scheduler
        .resolve_action(&sub2, Action::Reply("250950".into()))
        .unwrap();

    let root = scheduler
        .choose_context_to_advance_promise(root_answer_promise)
        .unwrap();
    let root = scheduler
        .resolve_action(
            &root,
            Action::AskSubquestion("What is 1505700 + 250950 + 5019?".into()),
        )
        .unwrap()
        .unwrap();
    let a3 = named(&root, "a3");

    scheduler
        .resolve_action(&root, Action::Unlock("a3".into()))
        .unwrap();
    let sub3 = scheduler.choose_context_to_advance_promise(a3).unwrap();
    scheduler
        .resolve_action(&sub3, Action::Reply("1761669".into()))
        .unwrap();

    let root = scheduler
        .choose_context_to_advance_promise(root_answer_promise)
        .unwrap();
    scheduler
        .resolve_action(&root, Action::Reply("1761669".into()))
        .unwrap();

    assert!(scheduler.store().is_fulfilled(root_answer_promise));
    let answer = render_resolved(scheduler.store(), root_answer_promise).unwrap();
    assert_eq!(answer, "1761669");
}

#[test]
fn root_reply_can_reference_still_pending_promises() {
    let mut scheduler = Scheduler::new(Config::default());
    let root = scheduler.ask_root("Root?").unwrap();
    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("Sub1?".into()))
        .unwrap()
        .unwrap();
    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("Sub2?".into()))
        .unwrap()
        .unwrap();
    let a1 = named(&root, "a1");
    let a2 = named(&root, "a2");

    scheduler
        .resolve_action(&root, Action::Reply("Root [$a1 $a2].".into()))
        .unwrap();

    assert!(!scheduler.store().is_fulfilled(a1));
    assert!(!scheduler.store().is_fulfilled(a2));
}

#[test]
fn scheduler_advances_the_promise_newly_referenced_by_the_root_answer() {
    let mut scheduler = Scheduler::new(Config::default());
    let root = scheduler.ask_root("Root?").unwrap();
    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("Sub1?".into()))
        .unwrap()
        .unwrap();
    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("Sub2 ($a1)?".into()))
        .unwrap()
        .unwrap();
    let a2 = named(&root, "a2");

    scheduler
        .resolve_action(&root, Action::Reply("$a2".into()))
        .unwrap();

    let sub2 = scheduler.choose_context_to_advance_promise(a2).unwrap();
    assert!(sub2.display().contains("Sub2"));
}

#[test]
fn unlocking_an_unfulfilled_workspace_promise_suspends_without_error() {
    let mut scheduler = Scheduler::new(Config::default());
    let root = scheduler.ask_root("Root?").unwrap();
    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("Sub1?".into()))
        .unwrap()
        .unwrap();

    let outcome = scheduler.resolve_action(&root, Action::Unlock("w1".into()));
    assert!(outcome.is_ok());
    assert!(outcome.unwrap().is_none());
}

#[test]
fn reply_mixing_unlocked_and_locked_pointers_is_accepted() {
    let mut scheduler = Scheduler::new(Config::default());
    let root = scheduler.ask_root("Root?").unwrap();
    let root = scheduler
        .resolve_action(&root, Action::AskSubquestion("Sub1?".into()))
        .unwrap()
        .unwrap();

    let outcome = scheduler.resolve_action(&root, Action::Reply("$q1 $a1".into()));
    assert!(outcome.is_ok());
}

#[test]
fn unlocking_schedules_the_waiting_context_not_the_newest_one() {
    let mut scheduler = Scheduler::new(Config::default());
    let mut root = scheduler.ask_root("Root question?").unwrap();
    for text in ["Question 1?", "Question 2?", "Question 3?", "Question 4?"] {
        root = scheduler
            .resolve_action(&root, Action::AskSubquestion(text.into()))
            .unwrap()
            .unwrap();
    }
    let a2 = named(&root, "a2");

    scheduler
        .resolve_action(&root, Action::Unlock("a2".into()))
        .unwrap();

    let woken = scheduler.choose_context_to_advance_promise(a2).unwrap();
    assert!(woken.display().contains("Question 2?"));
    assert!(!woken.display().contains("Question 4?"));
}
