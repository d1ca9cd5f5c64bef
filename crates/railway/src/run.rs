//! Module loading and program execution.
//!
//! Loading turns source text into a [`Module`]: imports are resolved
//! recursively (merging functions and globals under their alias),
//! functions are compiled into the function table, and global-init
//! declarations are collected in order. Running a module initialises
//! the globals, resolves `main` (or `.main`), binds `argv` as a
//! borrowed array, and invokes the function forwards with an empty
//! input set.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use ahash::AHashMap;

use crate::{
    compile::{CompileError, GlobalDecl, compile_function, compile_global},
    exception::{ErrorKind, RailwayError, StackFrame},
    function::{FunctionTable, execute_function},
    io::{CollectStringPrint, SharedWriter, StdPrint, shared_writer},
    lex::{LexError, tokenise},
    parse::{AstItem, ParseError, Parser},
    scope::{Scope, Variable},
    value::MemoryCell,
};

/// Imports deeper than this indicate a cycle.
const MAX_IMPORT_DEPTH: usize = 64;

/// A failure while turning source files into a runnable module.
#[derive(Debug)]
pub enum LoadError {
    /// The file itself (or an imported file) could not be read.
    Io { path: PathBuf, message: String },
    Lex { path: PathBuf, error: LexError },
    Parse { path: PathBuf, error: ParseError },
    Compile { path: PathBuf, error: CompileError },
    /// Colliding names while assembling or merging modules.
    Clash { path: PathBuf, message: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "cannot read \"{}\": {message}", path.display())
            }
            Self::Lex { path, error } => write!(f, "in \"{}\": {error}", path.display()),
            Self::Parse { path, error } => write!(f, "in \"{}\": {error}", path.display()),
            Self::Compile { path, error } => write!(f, "in \"{}\": {error}", path.display()),
            Self::Clash { path, message } => write!(f, "in \"{}\": {message}", path.display()),
        }
    }
}

impl std::error::Error for LoadError {}

/// A compiled, runnable Railway module.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    globals: Vec<GlobalDecl>,
    functions: Arc<FunctionTable>,
}

impl Module {
    /// Loads and compiles a module from a file, resolving imports
    /// relative to the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| LoadError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let name = path
            .file_stem()
            .map_or_else(|| "module".to_owned(), |stem| stem.to_string_lossy().into_owned());
        Self::from_source(&source, &name, &base_dir)
    }

    /// Compiles a module from in-memory source. Imports are resolved
    /// relative to `base_dir`.
    pub fn from_source(source: &str, name: &str, base_dir: &Path) -> Result<Self, LoadError> {
        let mut parts = ModuleParts::default();
        load_into(&mut parts, source, Path::new(name), base_dir, 0)?;
        if parts.functions.contains_key("main") && parts.functions.contains_key(".main") {
            return Err(LoadError::Clash {
                path: PathBuf::from(name),
                message: "a module may define main or .main, not both".to_owned(),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            globals: parts.globals,
            functions: Arc::new(parts.functions),
        })
    }

    /// Runs the module with output on stdout.
    pub fn run(&self, argv: Vec<MemoryCell>) -> Result<(), RailwayError> {
        self.run_with_writer(argv, shared_writer(StdPrint))
    }

    /// Runs the module, printing through the given writer.
    pub fn run_with_writer(
        &self,
        argv: Vec<MemoryCell>,
        writer: SharedWriter,
    ) -> Result<(), RailwayError> {
        let globals = Arc::new(RwLock::new(AHashMap::new()));
        let main = self
            .functions
            .get("main")
            .or_else(|| self.functions.get(".main"))
            .cloned()
            .ok_or_else(|| {
                RailwayError::bare(
                    ErrorKind::UndefinedFunction,
                    format!("There is no main function in {}", self.name),
                )
            })?;

        let mut scope = Scope::new(
            main.name.clone(),
            globals,
            self.functions.clone(),
            vec![StackFrame::new(main.name.clone())],
            None,
            writer,
        );

        for decl in &self.globals {
            let value = match &decl.rhs {
                Some(expr) => expr.eval(&scope)?,
                None => MemoryCell::Num(crate::value::Number::zero()),
            };
            let var = Variable::from_cell(value, decl.is_mono);
            let mut table = scope
                .globals
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if table.contains_key(&decl.name) {
                return Err(scope.error(
                    ErrorKind::NameClash,
                    format!("Global \"{}\" already exists", decl.name),
                ));
            }
            table.insert(decl.name.clone(), var);
        }

        if !main.in_params.is_empty() {
            return Err(scope.error(
                ErrorKind::CallError,
                format!("Function {} must not take stolen parameters", main.name),
            ));
        }
        let borrowed = match main.borrowed_params.len() {
            0 => Vec::new(),
            1 => {
                let param = &main.borrowed_params[0];
                vec![Variable::array(argv, param.is_mono).borrowed()]
            }
            more => {
                return Err(scope.error(
                    ErrorKind::CallError,
                    format!("Function {} borrows {more} parameters; only argv is available", main.name),
                ));
            }
        };

        execute_function(&mut scope, &main, false, Vec::new(), borrowed)
            .map(|_returned| ())
            .map_err(crate::statements::RunError::into_error)
    }

    /// Convenience wrapper: run with a collecting writer and hand back
    /// everything the program printed.
    pub fn run_collecting_output(
        &self,
        argv: Vec<MemoryCell>,
    ) -> (Result<(), RailwayError>, String) {
        let collector = Arc::new(std::sync::Mutex::new(CollectStringPrint::new()));
        let shared: SharedWriter = collector.clone();
        let result = self.run_with_writer(argv, shared);
        let output = collector
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .output()
            .to_owned();
        (result, output)
    }
}

#[derive(Default)]
struct ModuleParts {
    globals: Vec<GlobalDecl>,
    functions: FunctionTable,
}

/// Prefixes a merged name with its import alias, keeping the mono
/// marker in front: `helper` becomes `m.helper`, `.helper` becomes
/// `.m.helper`.
fn prefixed(alias: &str, name: &str) -> String {
    match name.strip_prefix('.') {
        Some(rest) => format!(".{alias}.{rest}"),
        None => format!("{alias}.{name}"),
    }
}

fn load_into(
    parts: &mut ModuleParts,
    source: &str,
    path: &Path,
    base_dir: &Path,
    depth: usize,
) -> Result<(), LoadError> {
    let tokens = tokenise(source).map_err(|error| LoadError::Lex {
        path: path.to_path_buf(),
        error,
    })?;
    let items = Parser::new(tokens).module().map_err(|error| LoadError::Parse {
        path: path.to_path_buf(),
        error,
    })?;

    for item in items {
        match item {
            AstItem::Import {
                path: import_path,
                alias,
                ..
            } => {
                if depth >= MAX_IMPORT_DEPTH {
                    return Err(LoadError::Clash {
                        path: path.to_path_buf(),
                        message: format!("import depth exceeds {MAX_IMPORT_DEPTH}; probable import cycle"),
                    });
                }
                let file = base_dir.join(&import_path);
                let text = fs::read_to_string(&file).map_err(|err| LoadError::Io {
                    path: file.clone(),
                    message: err.to_string(),
                })?;
                let sub_base = file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
                let mut sub = ModuleParts::default();
                load_into(&mut sub, &text, &file, &sub_base, depth + 1)?;

                let alias = alias.unwrap_or_default();
                for mut decl in sub.globals {
                    if !alias.is_empty() {
                        decl.name = prefixed(&alias, &decl.name);
                    }
                    parts.globals.push(decl);
                }
                for (name, func) in sub.functions {
                    let merged = if alias.is_empty() {
                        name
                    } else {
                        prefixed(&alias, &name)
                    };
                    if parts.functions.insert(merged.clone(), func).is_some() {
                        return Err(LoadError::Clash {
                            path: path.to_path_buf(),
                            message: format!("imported name \"{merged}\" clashes with an existing function"),
                        });
                    }
                }
            }
            AstItem::Global { line, name, rhs } => {
                let decl =
                    compile_global(line, &name, rhs.as_ref()).map_err(|error| LoadError::Compile {
                        path: path.to_path_buf(),
                        error,
                    })?;
                parts.globals.push(decl);
            }
            AstItem::Function(func) => {
                let compiled = compile_function(&func).map_err(|error| LoadError::Compile {
                    path: path.to_path_buf(),
                    error,
                })?;
                if parts
                    .functions
                    .insert(compiled.name.clone(), Arc::new(compiled))
                    .is_some()
                {
                    return Err(LoadError::Compile {
                        path: path.to_path_buf(),
                        error: CompileError::new(
                            func.line,
                            crate::compile::SyntaxErrorKind::DuplicateDefinition,
                            format!("Function \"{}\" is defined twice", func.name),
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}
