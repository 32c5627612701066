use std::{env, path::Path, process};

use ember::runtime::{
    Global, NativeRegistry, ProcessState, RuntimeConfig, RuntimeError, Value,
    loader::Loader,
    native::expect_arity,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let mut args: Vec<String> = env::args().collect();
    let verbose = args.iter().any(|arg| arg == "--verbose");
    let trace = args.iter().any(|arg| arg == "--trace");
    let no_gc = args.iter().any(|arg| arg == "--no-gc");
    let disassemble = args.iter().any(|arg| arg == "--disassemble");
    if verbose {
        args.retain(|arg| arg != "--verbose");
    }
    if trace {
        args.retain(|arg| arg != "--trace");
    }
    if no_gc {
        args.retain(|arg| arg != "--no-gc");
    }
    if disassemble {
        args.retain(|arg| arg != "--disassemble");
    }
    let gc_threshold = match extract_gc_threshold(&mut args) {
        Some(value) => value,
        None => return,
    };
    let config_path = match extract_value(&mut args, "--config") {
        Some(value) => value,
        None => return,
    };
    let entry = match extract_value(&mut args, "--entry") {
        Some(value) => value.unwrap_or_else(|| "main".to_string()),
        None => return,
    };

    init_tracing(verbose, trace);

    if args.len() < 2 {
        print_help();
        return;
    }

    let mut config = match config_path {
        Some(path) => match RuntimeConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => fail(&err, &[]),
        },
        None => RuntimeConfig::default(),
    };
    if trace {
        config.trace = true;
    }
    if no_gc {
        config.gc_enabled = false;
    }
    if let Some(threshold) = gc_threshold {
        config.gc_threshold = threshold;
    }

    if is_definition_file(&args[1]) {
        run_file(&args[1], &entry, config, disassemble);
        return;
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => {
            print_help();
        }
        "run" => {
            if args.len() < 3 {
                eprintln!("Usage: ember run <file.json>");
                return;
            }
            run_file(&args[2], &entry, config, disassemble);
        }
        "bytecode" => {
            if args.len() < 3 {
                eprintln!("Usage: ember bytecode <file.json>");
                return;
            }
            show_bytecode(&args[2], config);
        }
        "classes" => {
            if args.len() < 3 {
                eprintln!("Usage: ember classes <file.json>");
                return;
            }
            show_classes(&args[2], config);
        }
        other => {
            eprintln!("Error: unknown command `{}`", other);
            print_help();
        }
    }
}

fn print_help() {
    println!(
        "\
Ember runtime

Usage:
  ember <file.json>
  ember run <file.json>
  ember bytecode <file.json>
  ember classes <file.json>

Flags:
  --entry <name>       Procedure to run (default: main)
  --config <file>      Load runtime settings from a JSON file
  --verbose            Log loading and class completion
  --trace              Log every executed instruction
  --disassemble        Print each procedure's bytecode before running
  --no-gc              Disable garbage collection
  --gc-threshold <n>   Allocations between collections
  -h, --help           Show this help message
"
    );
}

fn init_tracing(verbose: bool, trace: bool) {
    let default = if trace {
        "ember=trace"
    } else if verbose {
        "ember=debug"
    } else {
        "ember=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn is_definition_file(path: &str) -> bool {
    Path::new(path).extension().and_then(|ext| ext.to_str()) == Some("json")
}

fn host_natives() -> NativeRegistry {
    let mut natives = NativeRegistry::new();
    natives.register("print", |_, args| {
        let line = args
            .iter()
            .map(Value::to_string_value)
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", line);
        Ok(())
    });
    natives.register("to_string", |target, args| {
        expect_arity("to_string", args, 1)?;
        *target = Value::from(args[0].to_string_value());
        Ok(())
    });
    natives
}

fn load(path: &str, config: RuntimeConfig) -> ProcessState {
    let mut state = match ProcessState::with_config(config) {
        Ok(state) => state,
        Err(err) => fail(&err, &[]),
    };
    let natives = host_natives();
    if let Err(err) = Loader::new(&natives).load_file(&mut state, path) {
        fail(&err, &[]);
    }
    if let Err(err) = state.complete_all() {
        fail(&err, &[]);
    }
    state
}

fn run_file(path: &str, entry: &str, config: RuntimeConfig, disassemble: bool) {
    let mut state = load(path, config);
    if disassemble {
        print_bytecode(&state);
    }
    match state.run(entry, Vec::new()) {
        Ok(Value::Void) => {}
        Ok(value) => println!("{}", value),
        Err(err) => {
            let backtrace = state.last_backtrace().to_vec();
            fail(&err, &backtrace);
        }
    }
    state.shutdown();
}

fn show_bytecode(path: &str, config: RuntimeConfig) {
    let state = load(path, config);
    print_bytecode(&state);
}

fn print_bytecode(state: &ProcessState) {
    for name in global_names(state) {
        let Ok(Global::Procedure(procedure)) = state.get_global(&name) else {
            continue;
        };
        match procedure.code() {
            Some(code) => {
                println!("== {} ({}) ==", name, &code.fingerprint_hex()[..12]);
                print!("{}", code.disassemble());
            }
            None => println!("== {} (native) ==", name),
        }
    }
}

fn show_classes(path: &str, config: RuntimeConfig) {
    let state = load(path, config);
    for name in state.globals().class_names() {
        match state.get_class(&name) {
            Ok(class) => print!("{}", class.borrow().describe()),
            Err(err) => fail(&err, &[]),
        }
    }
}

fn global_names(state: &ProcessState) -> Vec<String> {
    state.globals().names().map(str::to_string).collect()
}

fn fail(err: &RuntimeError, backtrace: &[String]) -> ! {
    eprintln!("error[{}]: {}", err.code(), err);
    for frame in backtrace {
        eprintln!("  at {}", frame);
    }
    process::exit(1);
}

fn extract_gc_threshold(args: &mut Vec<String>) -> Option<Option<usize>> {
    let mut threshold = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--gc-threshold" {
            if i + 1 >= args.len() {
                eprintln!("Usage: ember <file.json> --gc-threshold <n>");
                return None;
            }
            let value = args.remove(i + 1);
            args.remove(i);
            match value.parse::<usize>() {
                Ok(parsed) => {
                    threshold = Some(parsed);
                }
                Err(_) => {
                    eprintln!("Error: --gc-threshold expects a non-negative integer.");
                    return None;
                }
            }
            continue;
        }
        i += 1;
    }
    Some(threshold)
}

fn extract_value(args: &mut Vec<String>, flag: &str) -> Option<Option<String>> {
    let mut found = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 >= args.len() {
                eprintln!("Usage: ember <file.json> {} <value>", flag);
                return None;
            }
            found = Some(args.remove(i + 1));
            args.remove(i);
            continue;
        }
        i += 1;
    }
    Some(found)
}
