pub mod health;
pub mod scan;
pub mod snmp;
pub mod topology;
pub mod ws;
