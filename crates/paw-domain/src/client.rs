//! Vista mínima del cliente que necesita el despachador de workflows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContact {
    pub client_id: i64,
    pub name: String,
    pub email: String,
}
