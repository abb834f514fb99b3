use super::*;
use crate::provision::{ProviderReport, Session};
use crate::providers::Provider;

fn console() -> Console {
    Console::new(false, false)
}

#[test]
fn legacy_key_is_replaced_everywhere_and_identity_alias_is_kept() {
    let template = "client = OpenAI(api_key=\"vk-frontend-app\")\n\
                    model=\"gpt-4-turbo\"\n\
                    # remember to swap vk-frontend-app for your own key\n";
    let subs = Substitutions::for_demo("vk-quickstart-1700000000", "gpt-4-turbo", LEGACY_BASE_URL);

    let out = subs.apply(template);
    assert!(!out.contains("vk-frontend-app"));
    assert_eq!(out.matches("vk-quickstart-1700000000").count(), 2);
    assert!(out.contains("model=\"gpt-4-turbo\""));
}

#[test]
fn delimited_placeholders_are_filled() {
    let subs = Substitutions::for_demo("vk-quickstart-1", "gpt-4o", "http://proxy:9000");
    let out = subs.apply("{{BASE_URL}}/v1 key={{VIRTUAL_KEY}} model={{MODEL_ALIAS}}");
    assert_eq!(out, "http://proxy:9000/v1 key=vk-quickstart-1 model=gpt-4o");
}

#[test]
fn legacy_base_url_follows_configured_proxy() {
    let subs = Substitutions::for_demo("k", "a", "http://10.0.0.5:8132");
    assert_eq!(
        subs.apply("url = \"http://localhost:8132/v1/chat/completions\""),
        "url = \"http://10.0.0.5:8132/v1/chat/completions\""
    );
}

#[test]
fn replacements_are_not_rewritten() {
    let subs = Substitutions::for_demo("vk-quickstart-1", "gemini-3-flash-preview", LEGACY_BASE_URL);
    assert_eq!(
        subs.apply("gpt-4o then gemini-3-flash"),
        "gemini-3-flash-preview then gemini-3-flash-preview"
    );
}

#[test]
fn non_ascii_text_passes_through() {
    let subs = Substitutions::for_demo("vk-quickstart-1", "gpt-4o", LEGACY_BASE_URL);
    assert_eq!(
        subs.apply("สวัสดีค่ะ model=gpt-4o ✅"),
        "สวัสดีค่ะ model=gpt-4o ✅"
    );
}

#[test]
fn answers_other_than_yes_decline() {
    assert_eq!(parse_answer("y\n"), Confirmation::Yes);
    assert_eq!(parse_answer(" YES "), Confirmation::Yes);
    assert_eq!(parse_answer("n"), Confirmation::No);
    assert_eq!(parse_answer(""), Confirmation::No);
    assert_eq!(parse_answer("yep"), Confirmation::No);
}

#[test]
fn demos_follow_configured_providers() {
    let mut context = ProvisionContext::new(Session::new(1));
    context.providers = vec![
        ProviderReport {
            provider: Provider::Openai,
            outcome: ProviderOutcome::Skipped {
                reason: "OPENAI_API_KEY not set".to_string(),
            },
        },
        ProviderReport {
            provider: Provider::Azure,
            outcome: ProviderOutcome::Configured {
                connection_id: "c".to_string(),
                model_id: "m-azure".to_string(),
                alias: "gpt-4o".to_string(),
            },
        },
        ProviderReport {
            provider: Provider::Google,
            outcome: ProviderOutcome::Configured {
                connection_id: "c".to_string(),
                model_id: "m-google".to_string(),
                alias: "gemini-3-flash-preview".to_string(),
            },
        },
    ];
    context.models.insert("gpt-4o".to_string(), "m-azure".to_string());
    context
        .models
        .insert("gemini-3-flash-preview".to_string(), "m-google".to_string());

    let planned = plan_demos(&context);
    assert_eq!(
        planned,
        [
            PlannedDemo {
                template: "example_azure.py",
                alias: "gpt-4o".to_string(),
            },
            PlannedDemo {
                template: "example_google_vertex_http.py",
                alias: "gemini-3-flash-preview".to_string(),
            },
        ]
    );
}

#[test]
fn missing_template_is_reported_not_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ExampleRunner::new(PathBuf::from("python3"), dir.path().to_path_buf(), false);
    let outcome = runner.run_example("example_openai.py", &Substitutions::default());
    assert_eq!(
        outcome,
        DemoOutcome::TemplateNotFound {
            path: dir.path().join("example_openai.py").display().to_string()
        }
    );
}

#[test]
fn unspawnable_interpreter_is_a_fault() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("demo.py"), "print('hi')\n").expect("write template");
    let runner = ExampleRunner::new(
        dir.path().join("no-such-python"),
        dir.path().to_path_buf(),
        false,
    );
    let outcome = runner.run_example("demo.py", &Substitutions::default());
    assert!(matches!(outcome, DemoOutcome::Fault { .. }));
}

#[test]
fn interrupted_phase_runs_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ExampleRunner::new(PathBuf::from("python3"), dir.path().to_path_buf(), false);
    let interrupt = Interrupt::default();
    interrupt.0.store(true, Ordering::SeqCst);
    let planned = [PlannedDemo {
        template: "example_openai.py",
        alias: "gpt-4-turbo".to_string(),
    }];
    let reports = run_planned(&runner, &planned, "vk", LEGACY_BASE_URL, &interrupt, &console());
    assert!(reports.is_empty());
}

#[test]
fn interrupt_while_waiting_for_answer_reads_as_interrupted() {
    let (tx, rx) = mpsc::channel::<io::Result<String>>();
    let interrupt = Interrupt::default();
    let flag = Arc::clone(&interrupt.0);
    let trigger = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        flag.store(true, Ordering::SeqCst);
    });

    // The sender stays open, so only the interrupt can end the wait.
    assert_eq!(await_answer(&rx, &interrupt), Confirmation::Interrupted);
    trigger.join().expect("trigger thread");
    drop(tx);
}

#[test]
fn answer_line_or_closed_input_decides() {
    let (tx, rx) = mpsc::channel();
    tx.send(Ok("yes\n".to_string())).expect("send answer");
    assert_eq!(await_answer(&rx, &Interrupt::default()), Confirmation::Yes);
    drop(tx);
    assert_eq!(await_answer(&rx, &Interrupt::default()), Confirmation::No);
}

fn azure_configured() -> ProvisionContext {
    let mut context = ProvisionContext::new(Session::new(1700000000));
    context.providers.push(ProviderReport {
        provider: Provider::Azure,
        outcome: ProviderOutcome::Configured {
            connection_id: "c".to_string(),
            model_id: "m-azure".to_string(),
            alias: "gpt-4o".to_string(),
        },
    });
    context.models.insert("gpt-4o".to_string(), "m-azure".to_string());
    context
}

#[cfg(unix)]
mod unix {
    use super::*;

    fn sh() -> PathBuf {
        resolve_interpreter(Some(Path::new("sh"))).expect("sh on PATH")
    }

    #[test]
    fn materialized_script_sees_session_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_path = dir.path().join("seen.txt");
        std::fs::write(
            dir.path().join("example_openai.py"),
            format!(
                "printf '%s %s\\n' 'vk-frontend-app' 'gpt-4-turbo' > '{}'\n",
                out_path.display()
            ),
        )
        .expect("write template");

        let runner = ExampleRunner::new(sh(), dir.path().to_path_buf(), true);
        let subs = Substitutions::for_demo("vk-quickstart-1700000000", "gpt-4-turbo", LEGACY_BASE_URL);
        assert_eq!(runner.run_example("example_openai.py", &subs), DemoOutcome::Completed);

        let seen = std::fs::read_to_string(&out_path).expect("script output");
        assert_eq!(seen, "vk-quickstart-1700000000 gpt-4-turbo\n");
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("example_azure.py"), "exit 4\n").expect("write template");
        let runner = ExampleRunner::new(sh(), dir.path().to_path_buf(), true);
        assert_eq!(
            runner.run_example("example_azure.py", &Substitutions::default()),
            DemoOutcome::Failed { exit_code: Some(4) }
        );
    }

    #[test]
    fn planned_demos_report_each_outcome() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("example_azure.py"), "true\n").expect("write template");
        let runner = ExampleRunner::new(sh(), dir.path().to_path_buf(), true);
        let planned = [
            PlannedDemo {
                template: "example_azure.py",
                alias: "gpt-4o".to_string(),
            },
            PlannedDemo {
                template: "example_google_vertex_http.py",
                alias: "gemini-3-flash-preview".to_string(),
            },
        ];
        let reports = run_planned(
            &runner,
            &planned,
            "vk-quickstart-1",
            LEGACY_BASE_URL,
            &Interrupt::default(),
            &console(),
        );
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].outcome, DemoOutcome::Completed);
        assert!(matches!(
            reports[1].outcome,
            DemoOutcome::TemplateNotFound { .. }
        ));
    }

    fn marker_template(dir: &Path) -> PathBuf {
        let marker = dir.join("ran.txt");
        std::fs::write(
            dir.join("example_azure.py"),
            format!("touch '{}'\n", marker.display()),
        )
        .expect("write template");
        marker
    }

    #[test]
    fn interrupted_confirmation_skips_demos_and_keeps_provisioning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = marker_template(dir.path());
        let context = azure_configured();
        let before = context.clone();

        let config = DemoConfig {
            enabled: true,
            assume_yes: false,
            dir: dir.path().to_path_buf(),
            interpreter: None,
        };
        let console = console();
        let phase = DemoPhase {
            config: &config,
            console: &console,
            base_url: LEGACY_BASE_URL,
            stdout_to_stderr: true,
        };
        let runner = ExampleRunner::new(sh(), dir.path().to_path_buf(), true);
        let planned = plan_demos(&context);
        let (_answers_tx, answers) = mpsc::channel();

        let reports = phase.offer(&context, &planned, &runner, &Interrupt::default(), |interrupt| {
            interrupt.0.store(true, Ordering::SeqCst);
            await_answer(&answers, interrupt)
        });

        assert!(reports.is_empty());
        assert!(!marker.exists());
        assert_eq!(context, before);
    }

    #[test]
    fn assume_yes_runs_without_asking() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = marker_template(dir.path());
        let context = azure_configured();

        let config = DemoConfig {
            enabled: true,
            assume_yes: true,
            dir: dir.path().to_path_buf(),
            interpreter: None,
        };
        let console = console();
        let phase = DemoPhase {
            config: &config,
            console: &console,
            base_url: LEGACY_BASE_URL,
            stdout_to_stderr: true,
        };
        let runner = ExampleRunner::new(sh(), dir.path().to_path_buf(), true);
        let planned = plan_demos(&context);

        let reports = phase.offer(&context, &planned, &runner, &Interrupt::default(), |_| {
            panic!("confirmation requested despite --yes")
        });

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].outcome, DemoOutcome::Completed);
        assert!(marker.exists());
    }
}
