//! The abstract syntax tree built by the semantic checker.

use std::fmt;

use crate::semantic::tables::{FunctionTable, VarTable};
use crate::typing::Type;

/// All node kinds of the AST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Program,
    ProgramHeading,
    Identifier,
    Block,
    VarDeclPart,
    VarList,
    VarDecl,
    VarUse,
    StatementList,
    Assign,
    If,
    Repeat,
    FuncDecl,
    ProcCall,
    FuncIdent,
    ParamList,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Times,
    Over,
    And,
    Or,
    IntVal,
    RealVal,
    BoolVal,
    StrVal,
    B2I,
    B2R,
    B2S,
    I2R,
    I2S,
    R2S,
}

impl NodeKind {
    /// Kinds whose payload slot is meaningful.
    pub fn has_data(self) -> bool {
        matches!(
            self,
            NodeKind::IntVal
                | NodeKind::RealVal
                | NodeKind::BoolVal
                | NodeKind::StrVal
                | NodeKind::VarDecl
                | NodeKind::VarUse
                | NodeKind::FuncIdent
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeKind::Program => "program",
            NodeKind::ProgramHeading => "programHeading",
            NodeKind::Identifier => "identifier",
            NodeKind::Block => "block",
            NodeKind::VarDeclPart => "variableDeclarationPart",
            NodeKind::VarList => "variableDeclaration",
            NodeKind::VarDecl => "var_decl",
            NodeKind::VarUse => "var_use",
            NodeKind::StatementList => "statements",
            NodeKind::Assign => ":=",
            NodeKind::If => "if",
            NodeKind::Repeat => "repeat",
            NodeKind::FuncDecl => "functionDeclaration",
            NodeKind::ProcCall => "procedureDesignator",
            NodeKind::FuncIdent => "func_identifier",
            NodeKind::ParamList => "parameterList",
            NodeKind::Eq => "=",
            NodeKind::NotEq => "<>",
            NodeKind::Lt => "<",
            NodeKind::Le => "<=",
            NodeKind::Gt => ">",
            NodeKind::Ge => ">=",
            NodeKind::Plus => "+",
            NodeKind::Minus => "-",
            NodeKind::Times => "*",
            NodeKind::Over => "/",
            NodeKind::And => "AND",
            NodeKind::Or => "OR",
            NodeKind::IntVal | NodeKind::RealVal | NodeKind::BoolVal | NodeKind::StrVal => "",
            NodeKind::B2I => "B2I",
            NodeKind::B2R => "B2R",
            NodeKind::B2S => "B2S",
            NodeKind::I2R => "I2R",
            NodeKind::I2S => "I2S",
            NodeKind::R2S => "R2S",
        };
        write!(f, "{}", label)
    }
}

/// Per-node payload. At most one datum is ever meaningful for a given
/// kind, so the slot is a sum type rather than parallel int/float fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    None,
    /// Symbol-table index, integer literal, or boolean (0/1)
    Int(i64),
    /// Float literal
    Real(f64),
}

/// A node of the AST
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub kind: NodeKind,
    pub payload: Payload,
    pub ty: Type,
    pub children: Vec<Ast>,
}

impl Ast {
    pub fn new(kind: NodeKind, payload: Payload, ty: Type) -> Self {
        Self {
            kind,
            payload,
            ty,
            children: Vec::new(),
        }
    }

    /// A node carrying no payload, with the given children attached.
    pub fn subtree(kind: NodeKind, ty: Type, children: Vec<Ast>) -> Self {
        Self {
            kind,
            payload: Payload::None,
            ty,
            children,
        }
    }

    pub fn add_child(&mut self, child: Ast) {
        self.children.push(child);
    }

    pub fn child(&self, idx: usize) -> &Ast {
        &self.children[idx]
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Symbol-table index carried by VarDecl, VarUse, StrVal and FuncIdent
    /// nodes. Panics on nodes that carry no index.
    pub fn index(&self) -> usize {
        match self.payload {
            Payload::Int(v) => v as usize,
            _ => panic!("{:?} node carries no table index", self.kind),
        }
    }

    pub fn int_value(&self) -> i64 {
        match self.payload {
            Payload::Int(v) => v,
            _ => panic!("{:?} node carries no integer value", self.kind),
        }
    }

    pub fn real_value(&self) -> f64 {
        match self.payload {
            Payload::Real(v) => v,
            _ => panic!("{:?} node carries no real value", self.kind),
        }
    }

    /// Count nodes of the given kind in this subtree.
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        let here = usize::from(self.kind == kind);
        here + self
            .children
            .iter()
            .map(|c| c.count_kind(kind))
            .sum::<usize>()
    }

    /// Render the tree in Graphviz DOT format.
    pub fn to_dot(&self, vt: &VarTable, ft: &FunctionTable) -> String {
        let mut out = String::from("digraph {\ngraph [ordering=\"out\"];\n");
        let mut nr = 0;
        self.dot_node(&mut out, &mut nr, vt, ft);
        out.push_str("}\n");
        out
    }

    fn dot_node(&self, out: &mut String, nr: &mut usize, vt: &VarTable, ft: &FunctionTable) -> usize {
        use fmt::Write;

        let my_nr = *nr;
        *nr += 1;

        let _ = write!(out, "node{}[label=\"", my_nr);
        if self.ty != Type::NoType {
            let _ = write!(out, "({}) ", self.ty);
        }
        match self.kind {
            NodeKind::VarDecl | NodeKind::VarUse => {
                let _ = write!(out, "{}@", vt.name(self.index()));
            }
            NodeKind::FuncIdent => {
                let _ = write!(out, "{}", ft.name(self.index()));
            }
            _ => {
                let _ = write!(out, "{}", self.kind);
            }
        }
        if self.kind.has_data() {
            match self.kind {
                NodeKind::RealVal => {
                    let _ = write!(out, "{:.2}", self.real_value());
                }
                NodeKind::StrVal => {
                    let _ = write!(out, "@{}", self.index());
                }
                NodeKind::FuncIdent => {}
                _ => {
                    let _ = write!(out, "{}", self.int_value());
                }
            }
        }
        out.push_str("\"];\n");

        for child in &self.children {
            let child_nr = child.dot_node(out, nr, vt, ft);
            let _ = writeln!(out, "node{} -> node{};", my_nr, child_nr);
        }
        my_nr
    }
}
