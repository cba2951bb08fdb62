use super::*;
use crate::test_support::{failed, matches, ok, FakeRunner};

const TITLE: &str = "Update ECS templates for modified modules: alerts states-fim";
const BODY: &str =
    "This PR updates the ECS index templates for the following modules: alerts states-fim";

fn args(runner: &dyn CommandRunner) -> PullRequestArgs<'_> {
    PullRequestArgs {
        runner,
        repo_path: Path::new("/work/plugins"),
        branch: "ecs-update",
        base_branch: "master",
        title: TITLE,
        body: BODY,
        timeout: Duration::from_secs(30),
    }
}

fn gh_with_open_prs(list_json: &'static str) -> FakeRunner {
    FakeRunner::new(move |spec| {
        if matches(spec, "gh", &["pr", "list"]) {
            ok(list_json)
        } else if matches(spec, "gh", &["pr", "create"]) {
            ok("https://github.com/wazuh/wazuh-indexer-plugins/pull/512\n")
        } else {
            ok("")
        }
    })
}

#[test]
fn creates_pull_request_when_none_is_open() {
    let runner = gh_with_open_prs("[]\n");
    let outcome = upsert_pull_request(&args(&runner)).expect("upsert");

    assert_eq!(outcome, UpsertOutcome::Created { number: Some(512) });
    let calls = runner.calls();
    let create = calls
        .iter()
        .find(|spec| matches(spec, "gh", &["pr", "create"]))
        .expect("create call");
    assert_eq!(
        create.args,
        vec![
            "pr", "create", "--title", TITLE, "--body", BODY, "--base", "master", "--head",
            "ecs-update",
        ]
    );
    assert!(!runner.invoked("gh pr edit"));
}

#[test]
fn edits_the_existing_pull_request_in_place() {
    let runner = gh_with_open_prs(r#"[{"number":42,"updatedAt":"2024-05-01T10:00:00Z"}]"#);
    let outcome = upsert_pull_request(&args(&runner)).expect("upsert");

    assert_eq!(outcome, UpsertOutcome::Updated { number: 42 });
    assert!(runner.invoked("gh pr edit 42 --title"));
    assert!(!runner.invoked("gh pr create"));
}

#[test]
fn repeated_upserts_keep_editing_the_same_number() {
    let runner = gh_with_open_prs(r#"[{"number":42,"updatedAt":"2024-05-01T10:00:00Z"}]"#);
    let first = upsert_pull_request(&args(&runner)).expect("first upsert");
    let second = upsert_pull_request(&args(&runner)).expect("second upsert");
    assert_eq!(first, second);
    assert_eq!(
        runner
            .command_lines()
            .iter()
            .filter(|line| line.starts_with("gh pr edit 42"))
            .count(),
        2
    );
}

#[test]
fn multiple_matches_pick_most_recently_updated() {
    let runner = gh_with_open_prs(
        r#"[
            {"number":7,"updatedAt":"2024-05-03T08:00:00Z"},
            {"number":9,"updatedAt":"2024-05-01T08:00:00Z"},
            {"number":8,"updatedAt":"2024-05-03T08:00:00Z"}
        ]"#,
    );
    let outcome = upsert_pull_request(&args(&runner)).expect("upsert");
    assert_eq!(outcome, UpsertOutcome::Updated { number: 8 });
}

#[test]
fn lists_only_open_pull_requests_for_the_head_branch() {
    let runner = gh_with_open_prs("[]");
    upsert_pull_request(&args(&runner)).expect("upsert");
    assert_eq!(
        runner.command_lines()[0],
        "gh pr list --head ecs-update --state open --json number,updatedAt"
    );
    assert!(runner
        .calls()
        .iter()
        .all(|spec| spec.cwd.as_deref() == Some(Path::new("/work/plugins"))));
}

#[test]
fn inherited_token_variables_are_dropped_for_every_gh_call() {
    for list_json in ["[]", r#"[{"number":42,"updatedAt":"2024-05-01T10:00:00Z"}]"#] {
        let runner = gh_with_open_prs(list_json);
        upsert_pull_request(&args(&runner)).expect("upsert");
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        for spec in &calls {
            for key in ["GITHUB_TOKEN", "GH_TOKEN"] {
                assert!(
                    spec.env_remove.iter().any(|removed| removed == key),
                    "{key} inherited by {}",
                    spec.display()
                );
            }
        }
    }
}

#[test]
fn authentication_passes_token_on_stdin() {
    let runner = FakeRunner::succeeding();
    authenticate(&runner, Path::new("/work/plugins"), "ghp_example\n", Duration::from_secs(5))
        .expect("authenticate");
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec!["auth", "login", "--with-token"]);
    assert_eq!(calls[0].stdin.as_deref(), Some("ghp_example\n"));
    assert!(calls[0].env_remove.contains(&"GITHUB_TOKEN".to_string()));
    assert!(!calls[0].display().contains("ghp_example"));
}

#[test]
fn gh_failures_propagate() {
    let runner = FakeRunner::new(|spec| {
        if matches(spec, "gh", &["pr", "list"]) {
            failed(4, "gh: To get started with GitHub CLI, please run: gh auth login")
        } else {
            ok("")
        }
    });
    let err = upsert_pull_request(&args(&runner)).expect_err("list failure");
    assert!(format!("{err:#}").contains("gh auth login"));
    assert!(!runner.invoked("gh pr create"));
}

#[test]
fn created_number_is_optional() {
    assert_eq!(parse_created_number("https://github.com/o/r/pull/17\n"), Some(17));
    assert_eq!(parse_created_number("created\n"), None);
}
