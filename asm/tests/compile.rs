use mccasm::{
    compile_file, compile_str,
    config::CompilerArgs,
    msg::Level,
};
use std::fs;

fn assert(code: &str) {
    for (line_idx, line) in code.lines().enumerate() {
        println!("{:>2}: {}", line_idx + 1, line);
    }
    let result = compile_str("main.mccpu", code, &CompilerArgs::default()).unwrap();
    println!("{}", result.report);
    assert!(!result.report.has_error(), "Errors found: {}", result.report);
    assert!(result.program.is_some());
}

macro_rules! case {
    ($name:ident, $code:expr) => {
        #[test]
        fn $name() {
            assert($code);
        }
    };
}

case!(empty_program, "#memorylayout static auto incremental");
case!(halt, "#memorylayout static auto incremental\nhlt");
case!(pointers, "#memorylayout static auto incremental\nmov *&r1, &r2\nmov &r3, *&r1");
case!(addresses, "#memorylayout static auto incremental\nmov $0xff, &r0\nmov &r1, $0b101");
case!(
    subroutine,
    "#memorylayout static auto incremental\ncall print\nhlt\nprint:\nout &r0\nret"
);
case!(
    inline_macro,
    "#memorylayout static auto incremental\n#macro clear %register\nxor %1, %1\n#endmacro\nclear &r3\nhlt"
);
case!(
    static_layout,
    "#memorylayout static balanced\ncount\n#end\nmov &r0, *count\ninc &r0\nmov *count, &r0"
);

#[test]
fn string_arguments_pass_through_macros() {
    let code = "\
#memorylayout static auto incremental
#macro note %string
#endmacro
#macro section %string, %register
note %1
mov %2, 0
#endmacro
section \"init loop\", &r1
hlt";
    let result = compile_str("main.mccpu", code, &CompilerArgs::default()).unwrap();
    assert!(result.report.is_empty(), "{}", result.report);
    assert_eq!(result.program.unwrap().lines, vec!["mov &r1, 0", "hlt"]);

    let result = compile_str("main.mccpu", "#memorylayout static auto incremental\nmov &r1, \"x\"", &CompilerArgs::default()).unwrap();
    assert!(result.report.has_error());
}

fn write(dir: &std::path::Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn macro_files_are_included() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "macrodefs/std.mccpu",
        "#includemacrofile <util>\n#macro zero %register\nmov %1, 0x00\n#endmacro",
    );
    write(
        dir.path(),
        "macrodefs/util.mccpu",
        "#includemacrofile <std>\n#macro twice %register\nadd %1, %1\n#endmacro",
    );
    let main = write(
        dir.path(),
        "main.mccpu",
        "#includemacrofile <std>\n#memorylayout static auto incremental\nzero &r1\ntwice &r1\nhlt",
    );

    let result = compile_file(&main, &CompilerArgs::default()).unwrap();
    assert!(result.report.is_empty(), "{}", result.report);
    let program = result.program.unwrap();
    assert_eq!(program.lines, vec!["mov &r1, 0", "add &r1, &r1", "hlt"]);
}

#[test]
fn missing_macro_file() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.mccpu",
        "#includemacrofile <nothere>\n#memorylayout static auto incremental\nhlt",
    );
    let result = compile_file(&main, &CompilerArgs::default()).unwrap();
    assert!(result.report.has_error());
    assert!(result.program.is_none());
    let msg = &result.report.msgs()[0];
    assert_eq!(msg.pos.as_ref().map(|p| p.line), Some(1));
}

#[test]
fn missing_main_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = compile_file(&dir.path().join("none.mccpu"), &CompilerArgs::default());
    assert!(matches!(result, Err(mccasm::Error::FileOpen(..))));
}

#[test]
fn invalid_args_are_fatal() {
    let mut args = CompilerArgs::default();
    args.memory_size = 0;
    assert!(matches!(
        compile_str("main.mccpu", "hlt", &args),
        Err(mccasm::Error::InvalidArgument(_))
    ));
}

#[test]
fn complex_macro_with_unique_labels() {
    let src = "\
#memorylayout static auto incremental
#macro loop %register, %number
mov %1, %2
start_%uid:
...
dec %1
jnz %1, start_%uid
#endmacro endloop
loop &r0, 3
out &r0
endloop
hlt";
    let result = compile_str("main.mccpu", src, &CompilerArgs::default()).unwrap();
    assert!(result.report.is_empty(), "{}", result.report);
    let program = result.program.unwrap();
    assert_eq!(
        program.lines,
        vec!["mov &r0, 3", "out &r0", "dec &r0", "jnz &r0, 1", "hlt"]
    );
    assert_eq!(program.labels.get("start_1"), Some(1));
}

#[test]
fn warnings_only_stop_at_warning_level() {
    let src = "nop\nhlt";
    let result = compile_str("main.mccpu", src, &CompilerArgs::default()).unwrap();
    assert_eq!(result.report.status(), Level::Warning);
    assert!(result.program.is_some());

    let mut args = CompilerArgs::default();
    args.exit_level = Level::Warning;
    let result = compile_str("main.mccpu", src, &args).unwrap();
    assert!(result.program.is_none());
}

#[test]
fn register_count_is_checked() {
    let mut args = CompilerArgs::default();
    args.register_count = 4;
    let result = compile_str(
        "main.mccpu",
        "#memorylayout static auto incremental\nmov &r3, 1\nmov &r4, 1",
        &args,
    )
    .unwrap();
    assert_eq!(result.report.count(Level::Error), 1);
    assert_eq!(result.report.msgs()[0].pos.as_ref().map(|p| p.line), Some(3));
}
