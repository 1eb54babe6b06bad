use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};

pub type CustomerId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    // The external API's own spelling.
    #[serde(rename = "totalPayedAmount")]
    pub total_payed_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub customer_id: CustomerId,
    pub time: NaiveDateTime,
    #[serde(default)]
    pub products: Vec<String>,
    pub payment: Payment,
}

/// Capabilities of the store's point-of-sale system. The snapshot builder
/// only ever sees this trait, so it runs the same against the live export
/// and the in-memory directory used in tests.
pub trait SalesLookup {
    fn find_customer(&self, first_name: &str, last_name: &str) -> Result<Option<CustomerId>>;
    fn get_sales(
        &self,
        customer: &CustomerId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Sale>>;
    fn create_customer(&mut self, first_name: &str, last_name: &str) -> Result<CustomerId>;
    fn delete_customer(&mut self, customer: &CustomerId) -> Result<()>;
}

/// In-memory customer directory. Doubles as the fallback when no export
/// file is configured (every lookup finds nobody, so spend stays zero).
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    customers: Vec<Customer>,
    sales: Vec<Sale>,
    next_id: u64,
}

impl MemoryDirectory {
    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn add_sale(&mut self, sale: Sale) {
        self.sales.push(sale);
    }

    fn matches(customer: &Customer, first_name: &str, last_name: &str) -> bool {
        customer.first_name.eq_ignore_ascii_case(first_name)
            && customer.last_name.eq_ignore_ascii_case(last_name)
    }
}

impl SalesLookup for MemoryDirectory {
    fn find_customer(&self, first_name: &str, last_name: &str) -> Result<Option<CustomerId>> {
        let mut matched = self
            .customers
            .iter()
            .filter(|c| Self::matches(c, first_name, last_name));
        let first = matched.next();
        if matched.next().is_some() {
            return Err(TrustError::Pos(format!(
                "more than one customer is named {first_name} {last_name}"
            )));
        }
        Ok(first.map(|c| c.id.clone()))
    }

    fn get_sales(
        &self,
        customer: &CustomerId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Sale>> {
        Ok(self
            .sales
            .iter()
            .filter(|s| s.customer_id == *customer && s.time >= from && s.time <= to)
            .cloned()
            .collect())
    }

    fn create_customer(&mut self, first_name: &str, last_name: &str) -> Result<CustomerId> {
        loop {
            self.next_id += 1;
            let id = format!("c{:04}", self.next_id);
            if !self.customers.iter().any(|c| c.id == id) {
                self.customers.push(Customer {
                    id: id.clone(),
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                });
                return Ok(id);
            }
        }
    }

    fn delete_customer(&mut self, customer: &CustomerId) -> Result<()> {
        let before = self.customers.len();
        self.customers.retain(|c| c.id != *customer);
        if self.customers.len() == before {
            return Err(TrustError::Pos(format!("no customer with id {customer}")));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExportFile {
    #[serde(default)]
    customers: Vec<Customer>,
    #[serde(default)]
    sales: Vec<Sale>,
}

/// Customer directory backed by the point-of-sale JSON export file.
pub struct JsonDirectory {
    path: PathBuf,
    dir: MemoryDirectory,
}

impl JsonDirectory {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data: ExportFile = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                TrustError::Pos(format!("bad export file {}: {e}", path.display()))
            })?
        } else {
            ExportFile::default()
        };
        let next_id = data.customers.len() as u64;
        Ok(Self {
            path,
            dir: MemoryDirectory {
                customers: data.customers,
                sales: data.sales,
                next_id,
            },
        })
    }

    pub fn save(&self) -> Result<()> {
        let data = ExportFile {
            customers: self.dir.customers.clone(),
            sales: self.dir.sales.clone(),
        };
        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| TrustError::Pos(e.to_string()))?;
        std::fs::write(&self.path, format!("{json}\n"))?;
        Ok(())
    }

    pub fn customers(&self) -> &[Customer] {
        self.dir.customers()
    }
}

impl SalesLookup for JsonDirectory {
    fn find_customer(&self, first_name: &str, last_name: &str) -> Result<Option<CustomerId>> {
        self.dir.find_customer(first_name, last_name)
    }

    fn get_sales(
        &self,
        customer: &CustomerId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Sale>> {
        self.dir.get_sales(customer, from, to)
    }

    fn create_customer(&mut self, first_name: &str, last_name: &str) -> Result<CustomerId> {
        self.dir.create_customer(first_name, last_name)
    }

    fn delete_customer(&mut self, customer: &CustomerId) -> Result<()> {
        self.dir.delete_customer(customer)
    }
}
