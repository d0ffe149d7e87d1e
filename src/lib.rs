mod args;
mod error;
mod nfe_xml;
mod regex;
mod regras;
mod relatorio;
mod validacao;

pub use self::{
    args::*, error::*, nfe_xml::*, regex::*, regras::*, relatorio::*, validacao::*,
};
