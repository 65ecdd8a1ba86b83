//! meshstat bridge for local mesh node telemetry.
//!
//! This bridge reads kernel counter tables from `/proc`, samples the
//! neighbour tables through `ip neigh`, and queries the fastd status
//! sockets. Everything is flattened into one metric map per cycle.
//!
//! # Metric Keys
//!
//! ```text
//! <device>.<rx|tx>.<field>        ffda-br.rx.bytes
//! load.<15|5|1>                   load.15
//! ipv4.<Section>.<Column>         ipv4.Ip.InReceives
//! ipv6.<Key>                      ipv6.Ip6InReceives
//! ipv4.Neigh.<state>              ipv4.Neigh.reachable
//! netfilter.<count|max>           netfilter.count
//! context_switches
//! fastd.<instance>.<counter>      fastd.0.peers.online
//! fastd.drops
//! ```

pub mod collector;
pub mod config;
pub mod fastd;
pub mod neighbour;
pub mod proc_table;
