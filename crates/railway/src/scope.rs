//! Ownership-tracked variable bindings and the three-namespace scope.
//!
//! A scope separates `locals`, `monos` and `globals`. Mono names begin
//! with `.` and live exclusively in `monos`; lookups search monos,
//! locals, then globals. A variable owns its memory unless it is
//! borrowed, in which case it aliases memory owned elsewhere (a caller
//! frame, or a peer thread's shared parameter).

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;

use crate::{
    coordination::ThreadContext,
    exception::{ErrorKind, RailwayError, StackFrame},
    function::FunctionTable,
    io::SharedWriter,
    value::{MemoryCell, Number},
};

/// Variable storage. A scalar variable holds a length-1 sequence so
/// that indexing and in-place writes are uniform with arrays.
pub(crate) type SharedMemory = Arc<RwLock<Vec<MemoryCell>>>;

/// The global namespace, shared across call frames and worker threads.
pub(crate) type Globals = Arc<RwLock<AHashMap<String, Variable>>>;

/// A named binding owning (or borrowing) a memory cell.
///
/// Cloning a `Variable` clones the handle, not the memory: clones alias
/// the same storage, which is exactly what borrowed parameters and
/// shared globals need. The flags travel with the handle.
#[derive(Debug, Clone)]
pub(crate) struct Variable {
    memory: SharedMemory,
    pub is_array: bool,
    pub is_mono: bool,
    pub is_borrowed: bool,
}

impl Variable {
    pub fn scalar(value: Number, is_mono: bool) -> Self {
        Self {
            memory: Arc::new(RwLock::new(vec![MemoryCell::Num(value)])),
            is_array: false,
            is_mono,
            is_borrowed: false,
        }
    }

    pub fn array(cells: Vec<MemoryCell>, is_mono: bool) -> Self {
        Self {
            memory: Arc::new(RwLock::new(cells)),
            is_array: true,
            is_mono,
            is_borrowed: false,
        }
    }

    /// Builds a variable owning the given cell; arrays become array
    /// variables, numbers become scalars.
    pub fn from_cell(cell: MemoryCell, is_mono: bool) -> Self {
        match cell {
            MemoryCell::Array(cells) => Self::array(cells, is_mono),
            MemoryCell::Num(value) => Self::scalar(value, is_mono),
        }
    }

    /// A non-owning alias of this variable's memory, marked with the
    /// mono flag of the parameter it is bound to.
    pub fn alias(&self, is_mono: bool) -> Self {
        Self {
            memory: Arc::clone(&self.memory),
            is_array: self.is_array,
            is_mono,
            is_borrowed: true,
        }
    }

    /// Re-flags a stolen variable for the parameter slot it now fills.
    pub fn with_mono(mut self, is_mono: bool) -> Self {
        self.is_mono = is_mono;
        self
    }

    /// Marks a binding as borrowed: it owns no memory it may give away.
    pub fn borrowed(mut self) -> Self {
        self.is_borrowed = true;
        self
    }

    /// A stable token identifying the backing storage, used to order
    /// lock acquisition when two variables are locked together.
    pub fn memory_token(&self) -> usize {
        Arc::as_ptr(&self.memory) as usize
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<MemoryCell>> {
        self.memory
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<MemoryCell>> {
        self.memory
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Whether two variables alias the same storage.
    pub fn shares_memory_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.memory, &other.memory)
    }

    /// Deep copy of the variable's value as a single memory cell.
    pub fn value_cell(&self) -> MemoryCell {
        let memory = self.read();
        if self.is_array {
            MemoryCell::Array(memory.clone())
        } else {
            memory[0].clone()
        }
    }

    /// Consumes the variable, extracting its value without copying when
    /// this handle is the last owner.
    pub fn into_cell(self) -> MemoryCell {
        let is_array = self.is_array;
        let cells = match Arc::try_unwrap(self.memory) {
            Ok(lock) => lock.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner),
            Err(shared) => shared
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone(),
        };
        if is_array {
            MemoryCell::Array(cells)
        } else {
            cells.into_iter().next().unwrap_or(MemoryCell::Num(Number::zero()))
        }
    }
}

/// One call frame's view of the world: its own locals and monos, the
/// shared globals and function table, the call trace for diagnostics,
/// the output writer, and the parallel-call context when inside one.
pub(crate) struct Scope {
    pub name: String,
    locals: AHashMap<String, Variable>,
    monos: AHashMap<String, Variable>,
    pub globals: Globals,
    pub functions: Arc<FunctionTable>,
    /// Call path from the program entry down to this frame.
    trace: Vec<StackFrame>,
    pub threads: Option<ThreadContext>,
    pub writer: SharedWriter,
}

impl Scope {
    pub fn new(
        name: impl Into<String>,
        globals: Globals,
        functions: Arc<FunctionTable>,
        trace: Vec<StackFrame>,
        threads: Option<ThreadContext>,
        writer: SharedWriter,
    ) -> Self {
        Self {
            name: name.into(),
            locals: AHashMap::new(),
            monos: AHashMap::new(),
            globals,
            functions,
            trace,
            threads,
            writer,
        }
    }

    /// The call trace of this frame, outermost first.
    pub fn trace(&self) -> &[StackFrame] {
        &self.trace
    }

    /// Builds an error carrying this frame's call stack (innermost
    /// first, as rendered).
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> RailwayError {
        let mut stack: Vec<StackFrame> = self.trace.clone();
        stack.reverse();
        RailwayError::new(kind, message, stack)
    }

    /// Looks a name up through monos, locals, then globals.
    pub fn lookup(&self, name: &str) -> Result<Variable, RailwayError> {
        if let Some(var) = self.monos.get(name) {
            return Ok(var.clone());
        }
        if let Some(var) = self.locals.get(name) {
            return Ok(var.clone());
        }
        let globals = self
            .globals
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(var) = globals.get(name) {
            return Ok(var.clone());
        }
        Err(self.error(
            ErrorKind::UndefinedVariable,
            format!("Variable \"{name}\" is undefined"),
        ))
    }

    /// Like [`Scope::lookup`] but never falls through to globals; used
    /// where only frame-owned state is legal (unlet, returns, steals).
    pub fn lookup_frame(&self, name: &str) -> Result<Variable, RailwayError> {
        if let Some(var) = self.monos.get(name) {
            return Ok(var.clone());
        }
        if let Some(var) = self.locals.get(name) {
            return Ok(var.clone());
        }
        Err(self.error(
            ErrorKind::UndefinedVariable,
            format!("Variable \"{name}\" is undefined"),
        ))
    }

    /// Binds a variable: monos may be rebound freely, locals clash.
    pub fn assign(&mut self, name: &str, var: Variable) -> Result<(), RailwayError> {
        if var.is_mono {
            self.monos.insert(name.to_owned(), var);
            return Ok(());
        }
        if self.locals.contains_key(name) {
            return Err(self.error(
                ErrorKind::NameClash,
                format!("Variable \"{name}\" already exists"),
            ));
        }
        self.locals.insert(name.to_owned(), var);
        Ok(())
    }

    /// Unbinds a name from whichever frame namespace holds it.
    pub fn remove(&mut self, name: &str) -> Result<Variable, RailwayError> {
        if let Some(var) = self.monos.remove(name) {
            return Ok(var);
        }
        if let Some(var) = self.locals.remove(name) {
            return Ok(var);
        }
        Err(self.error(
            ErrorKind::UndefinedVariable,
            format!("Local variable \"{name}\" does not exist"),
        ))
    }

    /// Removes a mono binding specifically; promotion demands one.
    pub fn remove_mono(&mut self, name: &str) -> Result<Variable, RailwayError> {
        self.monos.remove(name).ok_or_else(|| {
            self.error(
                ErrorKind::ExpectedMono,
                format!("Mono variable \"{name}\" is not in scope"),
            )
        })
    }

    /// Any live mono binding, used by the direction-change guard.
    pub fn live_mono_name(&self) -> Option<&str> {
        self.monos.keys().next().map(String::as_str)
    }

    pub fn locals(&self) -> &AHashMap<String, Variable> {
        &self.locals
    }

    /// Updates the array flag of a root binding after a whole-value
    /// swap changed its shape.
    pub fn set_is_array(&mut self, name: &str, is_array: bool) {
        if let Some(var) = self.monos.get_mut(name) {
            var.is_array = is_array;
        } else if let Some(var) = self.locals.get_mut(name) {
            var.is_array = is_array;
        } else {
            let mut globals = self
                .globals
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(var) = globals.get_mut(name) {
                var.is_array = is_array;
            }
        }
    }

    /// The 0-based thread index inside a parallel call, or -1 outside.
    pub fn thread_number(&self) -> Number {
        match &self.threads {
            Some(ctx) => Number::from_integer(ctx.thread_id as i64),
            None => Number::from_integer(-1),
        }
    }

    /// The thread count inside a parallel call, or -1 outside.
    pub fn thread_count(&self) -> Number {
        match &self.threads {
            Some(ctx) => Number::from_integer(ctx.manager.num_threads() as i64),
            None => Number::from_integer(-1),
        }
    }
}
