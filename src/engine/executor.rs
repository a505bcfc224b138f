#![forbid(unsafe_code)]

//! The Spork engine: program loading and whole-document runs

use crate::document::{self, NodeRef};
use crate::engine::evaluator::{self, Evaluation};
use crate::engine::selection::Selection;
use crate::error::{EvalError, ScriptError, SporkError};
use crate::expr::{GlobalScope, ModuleRegistry, Value};
use crate::rules::{
    Abort, AttributeMapping, FlowControl, NODE_KEY, Namespace, Rule, engine_module,
    seed_namespace, strip_reserved, tag_identifier,
};
use crate::script::{Declaration, Statement, parse_script};
use crate::selector::MatchExpr;
use crate::types::{Format, ParserOptions};
use std::io::Read;

/// Selector text of rules that run once per run, unbound to any node
pub const UNCONDITIONAL: &str = "_";

/// Settings applied while a program is loaded
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Report script errors and unknown at-rules, and stop loading at them
    pub warn: bool,
    /// Document formats tried by [`Spork::get_root`], in order
    pub formats: Vec<Format>,
    /// Modules available to `@import`
    pub modules: ModuleRegistry,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            warn: false,
            formats: Format::default_order(),
            modules: ModuleRegistry::standard(),
        }
    }
}

/// A loaded Spork program
///
/// The rule list and global scope are fixed once loading finishes, so one
/// engine can serve runs over many documents, including from several
/// threads at once.
#[derive(Debug)]
pub struct Spork {
    rules: Vec<Rule>,
    globals: GlobalScope,
    formats: Vec<Format>,
    diagnostics: Vec<String>,
    document: Option<NodeRef>,
}

impl Spork {
    /// Load a program with default options
    ///
    /// # Errors
    ///
    /// Unknown `@import` modules and invalid selectors.
    pub fn new(source: &str) -> Result<Self, SporkError> {
        Self::with_options(source, EngineOptions::default())
    }

    /// Load a program read from `reader`
    pub fn from_reader(mut reader: impl Read, options: EngineOptions) -> Result<Self, SporkError> {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|source| SporkError::Io {
                path: "<program>".into(),
                source,
            })?;
        Self::with_options(&source, options)
    }

    /// Load a program
    ///
    /// A leading `#!` line is ignored.
    ///
    /// # Errors
    ///
    /// Unknown `@import` modules and invalid selectors.
    pub fn with_options(source: &str, options: EngineOptions) -> Result<Self, SporkError> {
        let source = match source.strip_prefix("#!") {
            Some(rest) => rest.find('\n').map_or("", |end| &rest[end..]),
            None => source,
        };

        let module = Value::from(engine_module());
        let mut globals = GlobalScope::new();
        globals.insert("self", module.clone());
        globals.insert("Spork", module);

        let mut spork = Spork {
            rules: Vec::new(),
            globals,
            formats: options.formats,
            diagnostics: Vec::new(),
            document: None,
        };
        spork.load(source, options.warn, &options.modules)?;
        Ok(spork)
    }

    fn load(&mut self, source: &str, warn: bool, modules: &ModuleRegistry) -> Result<(), SporkError> {
        let stylesheet = parse_script(source);
        if !stylesheet.errors.is_empty() {
            if warn {
                for error in &stylesheet.errors {
                    self.report(error);
                }
                return Ok(());
            }
            for error in &stylesheet.errors {
                log::debug!("Dropped statement: {}", error);
            }
        }

        for statement in stylesheet.statements {
            match statement {
                Statement::AtRule { ref keyword, .. } if keyword.eq_ignore_ascii_case("import") => {
                    let Some(name) = statement.import_uri() else {
                        continue;
                    };
                    let module = modules
                        .get(&name)
                        .ok_or_else(|| ScriptError::UnknownModule(name.clone()))?;
                    log::debug!("Imported module {}", name);
                    self.globals.insert(name, module);
                }
                Statement::AtRule { keyword, .. } => {
                    if warn {
                        self.report(&ScriptError::UnknownAtRule(keyword));
                        return Ok(());
                    }
                }
                Statement::Ruleset {
                    selector,
                    declarations,
                    ..
                } => {
                    let match_expr = if selector == UNCONDITIONAL {
                        None
                    } else {
                        Some(MatchExpr::compile(&selector)?)
                    };
                    self.rules.push(Rule::new(match_expr, declarations));
                }
            }
        }
        Ok(())
    }

    fn report(&mut self, error: &ScriptError) {
        log::warn!("{}", error);
        self.diagnostics.push(error.to_string());
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Problems reported while loading in warn mode
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn globals(&self) -> &GlobalScope {
        &self.globals
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn set_formats(&mut self, formats: Vec<Format>) {
        self.formats = formats;
    }

    /// The document recorded by the last successful [`Spork::get_root`]
    pub fn document(&self) -> Option<&NodeRef> {
        self.document.as_ref()
    }

    /// Parse a document in the first configured format that accepts it
    ///
    /// The root is remembered as the default document of later runs.
    ///
    /// # Errors
    ///
    /// Read failures, or the last parse failure when no format succeeds.
    pub fn get_root(&mut self, mut reader: impl Read, options: &ParserOptions) -> Result<NodeRef, SporkError> {
        let mut input = Vec::new();
        reader
            .read_to_end(&mut input)
            .map_err(crate::error::DocumentError::Io)?;
        let root = document::parse_any(&input, &self.formats, options)?;
        self.document = Some(root.clone());
        Ok(root)
    }

    fn resolve_document<'a>(&'a self, document: Option<&'a NodeRef>) -> Result<&'a NodeRef, SporkError> {
        document.or(self.document.as_ref()).ok_or(SporkError::NoDocument)
    }

    /// Evaluate `declarations` for `node` (or unbound, for `None`)
    ///
    /// A `_` declaration on a node binds the node's tag identifier; on no
    /// node it is evaluated for its side effects and discarded.
    ///
    /// # Errors
    ///
    /// Evaluation errors and flow-control signals; `Selector` is left to
    /// the caller.
    pub fn process(
        &self,
        node: Option<&NodeRef>,
        declarations: &[Declaration],
        namespace: &mut Namespace,
    ) -> Result<(), Abort> {
        namespace.insert(
            NODE_KEY.to_string(),
            node.map_or(Value::None, |n| Value::Node(n.clone())),
        );
        let mut attributes = AttributeMapping::new(node.cloned());
        for declaration in declarations {
            let name = match node {
                Some(node) if declaration.name == NODE_KEY => tag_identifier(node),
                _ => declaration.name.clone(),
            };
            let Evaluation { value, replace } = evaluator::evaluate(
                &name,
                &declaration.value,
                namespace,
                &mut attributes,
                &self.globals,
            )?;
            if name == NODE_KEY {
                continue;
            }
            if replace {
                namespace.insert(name, value);
            } else {
                match namespace.entry(name).or_insert_with(|| Value::List(Vec::new())) {
                    Value::List(items) => items.push(value),
                    other => {
                        return Err(Abort::Error(EvalError::Attribute(format!(
                            "'{}' object has no attribute 'append'",
                            other.type_name()
                        ))));
                    }
                }
            }
        }
        Ok(())
    }

    /// Run every rule with `root` as the scope of selection
    ///
    /// # Errors
    ///
    /// Evaluation errors, and `Element`, `Program` and `Default` signals.
    pub fn run_element(&self, root: &NodeRef) -> Result<Namespace, Abort> {
        let mut namespace = seed_namespace(root);
        let namespaces = root.document().namespaces();
        for rule in &self.rules {
            let Some(expr) = &rule.match_expr else {
                catch_selector(self.process(None, &rule.declarations, &mut namespace))?;
                continue;
            };
            log::debug!("selecting {}", expr);
            for node in expr.select(root, namespaces)? {
                catch_selector(self.process(Some(&node), &rule.declarations, &mut namespace))?;
            }
        }
        strip_reserved(&mut namespace);
        for (name, value) in &namespace {
            log::debug!("{} => {}", name, value.repr());
        }
        Ok(namespace)
    }

    /// Run the program over `document`, or the last loaded document
    ///
    /// A flow-control signal escaping the run yields an empty namespace.
    ///
    /// # Errors
    ///
    /// `NoDocument` without a document, or the evaluation error of a run.
    pub fn run(&self, document: Option<&NodeRef>) -> Result<Namespace, SporkError> {
        let root = self.resolve_document(document)?;
        match self.run_element(root) {
            Ok(namespace) => Ok(namespace),
            Err(Abort::Signal(signal)) => {
                log::debug!("run stopped by {}", signal);
                Ok(Namespace::new())
            }
            Err(Abort::Error(err)) => Err(err.into()),
        }
    }

    /// Lazily run the program once per element matching `css`
    ///
    /// # Errors
    ///
    /// `NoDocument` without a document, or an invalid selector.
    pub fn selector<'a>(&'a self, css: &str, document: Option<&'a NodeRef>) -> Result<Selection<'a>, SporkError> {
        let root = self.resolve_document(document)?;
        let expr = MatchExpr::compile(css)?;
        let matches = expr.select(root, root.document().namespaces())?;
        Ok(Selection::new(self, matches))
    }

    /// Eager form of [`Spork::selector`]
    ///
    /// # Errors
    ///
    /// As [`Spork::selector`], plus the first evaluation error of a run.
    pub fn select(&self, css: &str, document: Option<&NodeRef>) -> Result<Vec<(NodeRef, Namespace)>, SporkError> {
        self.selector(css, document)?.collect()
    }
}

/// Absorb a `Selector` signal, which only ends the current match
fn catch_selector(result: Result<(), Abort>) -> Result<(), Abort> {
    match result {
        Err(Abort::Signal(FlowControl::Selector)) => Ok(()),
        other => other,
    }
}
