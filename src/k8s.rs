use anyhow::{Context, Result};
use futures::future::BoxFuture;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{
    ConfigMap, Event, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, PodStatus,
    Secret, Service, ServiceAccount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::{DeleteParams, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::delta::format_duration;
use crate::model::{
    Header, HeaderColumn, MISSING_VALUE, ResourceKind, Row, Scope, Snapshot, fqn, split_fqn,
};

const LIST_LIMIT: u32 = 500;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ListRequest {
    pub kind: ResourceKind,
    pub scope: Scope,
    pub labels: Option<String>,
}

impl ListRequest {
    fn params(&self) -> ListParams {
        let params = ListParams::default().limit(LIST_LIMIT);
        match self.labels.as_deref() {
            Some(selector) if !selector.trim().is_empty() => params.labels(selector.trim()),
            _ => params,
        }
    }
}

/// Narrow contract the table engine needs from a cluster client.
pub trait Accessor: Send + Sync {
    fn list<'a>(&'a self, request: &'a ListRequest) -> BoxFuture<'a, Result<Snapshot>>;
    fn describe<'a>(&'a self, kind: ResourceKind, key: &'a str) -> BoxFuture<'a, Result<String>>;
    fn delete<'a>(&'a self, kind: ResourceKind, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
}

impl KubeGateway {
    pub async fn new() -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();
        let config = match kubeconfig.clone() {
            Some(kubeconfig) => {
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("failed to infer Kubernetes configuration")?
            }
            None => Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?,
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = kubeconfig
            .and_then(|kubeconfig| kubeconfig.current_context)
            .unwrap_or_else(|| "in-cluster".to_string());

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn scoped_api<K>(&self, scope: &Scope) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        match scope {
            Scope::Namespace(namespace) => Api::namespaced(self.client.clone(), namespace),
            Scope::AllNamespaces | Scope::NotNamespaced => Api::all(self.client.clone()),
        }
    }

    fn namespaced_api<K>(&self, key: &str) -> Result<(Api<K>, String)>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let (namespace, name) = split_fqn(key);
        let namespace = namespace
            .filter(|namespace| !namespace.is_empty())
            .with_context(|| format!("namespace is required for {key}"))?;
        Ok((
            Api::namespaced(self.client.clone(), namespace),
            name.to_string(),
        ))
    }

    fn cluster_api<K>(&self) -> Api<K>
    where
        K: Resource,
        <K as Resource>::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }

    async fn list_snapshot(&self, request: &ListRequest) -> Result<Snapshot> {
        let params = request.params();
        let scope = &request.scope;
        let snapshot = match request.kind {
            ResourceKind::Pods => {
                let list = self.scoped_api::<Pod>(scope).list(&params).await?;
                pod_rows(scope, list.items)
            }
            ResourceKind::Deployments => {
                let list = self.scoped_api::<Deployment>(scope).list(&params).await?;
                deployment_rows(scope, list.items)
            }
            ResourceKind::StatefulSets => {
                let list = self.scoped_api::<StatefulSet>(scope).list(&params).await?;
                statefulset_rows(scope, list.items)
            }
            ResourceKind::DaemonSets => {
                let list = self.scoped_api::<DaemonSet>(scope).list(&params).await?;
                daemonset_rows(scope, list.items)
            }
            ResourceKind::ReplicaSets => {
                let list = self.scoped_api::<ReplicaSet>(scope).list(&params).await?;
                replicaset_rows(scope, list.items)
            }
            ResourceKind::Jobs => {
                let list = self.scoped_api::<Job>(scope).list(&params).await?;
                job_rows(scope, list.items)
            }
            ResourceKind::CronJobs => {
                let list = self.scoped_api::<CronJob>(scope).list(&params).await?;
                cronjob_rows(scope, list.items)
            }
            ResourceKind::Services => {
                let list = self.scoped_api::<Service>(scope).list(&params).await?;
                service_rows(scope, list.items)
            }
            ResourceKind::ConfigMaps => {
                let list = self.scoped_api::<ConfigMap>(scope).list(&params).await?;
                configmap_rows(scope, list.items)
            }
            ResourceKind::Secrets => {
                let list = self.scoped_api::<Secret>(scope).list(&params).await?;
                secret_rows(scope, list.items)
            }
            ResourceKind::ServiceAccounts => {
                let list = self.scoped_api::<ServiceAccount>(scope).list(&params).await?;
                service_account_rows(scope, list.items)
            }
            ResourceKind::PersistentVolumeClaims => {
                let list = self
                    .scoped_api::<PersistentVolumeClaim>(scope)
                    .list(&params)
                    .await?;
                pvc_rows(scope, list.items)
            }
            ResourceKind::Events => {
                let list = self.scoped_api::<Event>(scope).list(&params).await?;
                event_rows(scope, list.items)
            }
            ResourceKind::PersistentVolumes => {
                let list = self.cluster_api::<PersistentVolume>().list(&params).await?;
                pv_rows(list.items)
            }
            ResourceKind::Nodes => {
                let list = self.cluster_api::<Node>().list(&params).await?;
                node_rows(list.items)
            }
            ResourceKind::Namespaces => {
                let list = self.cluster_api::<Namespace>().list(&params).await?;
                namespace_rows(list.items)
            }
        };
        Ok(snapshot)
    }

    async fn describe_object(&self, kind: ResourceKind, key: &str) -> Result<String> {
        match kind {
            ResourceKind::Pods => self.describe_namespaced::<Pod>(key).await,
            ResourceKind::Deployments => self.describe_namespaced::<Deployment>(key).await,
            ResourceKind::StatefulSets => self.describe_namespaced::<StatefulSet>(key).await,
            ResourceKind::DaemonSets => self.describe_namespaced::<DaemonSet>(key).await,
            ResourceKind::ReplicaSets => self.describe_namespaced::<ReplicaSet>(key).await,
            ResourceKind::Jobs => self.describe_namespaced::<Job>(key).await,
            ResourceKind::CronJobs => self.describe_namespaced::<CronJob>(key).await,
            ResourceKind::Services => self.describe_namespaced::<Service>(key).await,
            ResourceKind::ConfigMaps => self.describe_namespaced::<ConfigMap>(key).await,
            ResourceKind::Secrets => self.describe_namespaced::<Secret>(key).await,
            ResourceKind::ServiceAccounts => {
                self.describe_namespaced::<ServiceAccount>(key).await
            }
            ResourceKind::PersistentVolumeClaims => {
                self.describe_namespaced::<PersistentVolumeClaim>(key).await
            }
            ResourceKind::Events => self.describe_namespaced::<Event>(key).await,
            ResourceKind::PersistentVolumes => {
                fetch_yaml(self.cluster_api::<PersistentVolume>(), key).await
            }
            ResourceKind::Nodes => fetch_yaml(self.cluster_api::<Node>(), key).await,
            ResourceKind::Namespaces => fetch_yaml(self.cluster_api::<Namespace>(), key).await,
        }
    }

    async fn describe_namespaced<K>(&self, key: &str) -> Result<String>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug + Serialize,
        <K as Resource>::DynamicType: Default,
    {
        let (api, name) = self.namespaced_api::<K>(key)?;
        fetch_yaml(api, &name).await
    }

    async fn delete_object(&self, kind: ResourceKind, key: &str) -> Result<()> {
        match kind {
            ResourceKind::Pods => self.delete_namespaced::<Pod>(key).await,
            ResourceKind::Deployments => self.delete_namespaced::<Deployment>(key).await,
            ResourceKind::StatefulSets => self.delete_namespaced::<StatefulSet>(key).await,
            ResourceKind::DaemonSets => self.delete_namespaced::<DaemonSet>(key).await,
            ResourceKind::ReplicaSets => self.delete_namespaced::<ReplicaSet>(key).await,
            ResourceKind::Jobs => self.delete_namespaced::<Job>(key).await,
            ResourceKind::CronJobs => self.delete_namespaced::<CronJob>(key).await,
            ResourceKind::Services => self.delete_namespaced::<Service>(key).await,
            ResourceKind::ConfigMaps => self.delete_namespaced::<ConfigMap>(key).await,
            ResourceKind::Secrets => self.delete_namespaced::<Secret>(key).await,
            ResourceKind::ServiceAccounts => self.delete_namespaced::<ServiceAccount>(key).await,
            ResourceKind::PersistentVolumeClaims => {
                self.delete_namespaced::<PersistentVolumeClaim>(key).await
            }
            ResourceKind::PersistentVolumes => {
                remove(self.cluster_api::<PersistentVolume>(), key).await
            }
            ResourceKind::Nodes => remove(self.cluster_api::<Node>(), key).await,
            ResourceKind::Namespaces => remove(self.cluster_api::<Namespace>(), key).await,
            ResourceKind::Events => {
                anyhow::bail!("delete is not supported for {}", kind.title());
            }
        }
    }

    async fn delete_namespaced<K>(&self, key: &str) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let (api, name) = self.namespaced_api::<K>(key)?;
        remove(api, &name).await
    }
}

impl Accessor for KubeGateway {
    fn list<'a>(&'a self, request: &'a ListRequest) -> BoxFuture<'a, Result<Snapshot>> {
        Box::pin(async move {
            self.list_snapshot(request).await.with_context(|| {
                format!("failed to list {} in {}", request.kind.title(), request.scope)
            })
        })
    }

    fn describe<'a>(&'a self, kind: ResourceKind, key: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.describe_object(kind, key)
                .await
                .with_context(|| format!("failed to describe {} {key}", kind.title()))
        })
    }

    fn delete<'a>(&'a self, kind: ResourceKind, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.delete_object(kind, key)
                .await
                .with_context(|| format!("failed to delete {} {key}", kind.title()))
        })
    }
}

async fn fetch_yaml<K>(api: Api<K>, name: &str) -> Result<String>
where
    K: Clone + DeserializeOwned + Debug + Serialize,
{
    let object = api.get(name).await?;
    Ok(yaml_detail(&object))
}

async fn remove<K>(api: Api<K>, name: &str) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    let _ = api.delete(name, &DeleteParams::default()).await?;
    Ok(())
}

/// Assembles rows keyed by stable key, prepending NAMESPACE in the
/// all-namespaces scope.
struct SnapshotBuilder {
    all_namespaces: bool,
    header: Header,
    rows: BTreeMap<String, Row>,
}

impl SnapshotBuilder {
    fn new(scope: &Scope, columns: Vec<HeaderColumn>) -> Self {
        let all_namespaces = scope.is_all();
        let mut header = Vec::with_capacity(columns.len() + 2);
        if all_namespaces {
            header.push(HeaderColumn::new("NAMESPACE"));
        }
        header.push(HeaderColumn::new("NAME"));
        header.extend(columns);
        Self {
            all_namespaces,
            header: Header::new(header),
            rows: BTreeMap::new(),
        }
    }

    fn cluster(columns: Vec<HeaderColumn>) -> Self {
        Self::new(&Scope::NotNamespaced, columns)
    }

    fn push(&mut self, namespace: Option<String>, name: String, fields: Vec<String>) {
        let key = fqn(namespace.as_deref(), &name);
        let mut row = Vec::with_capacity(fields.len() + 2);
        if self.all_namespaces {
            row.push(namespace.unwrap_or_else(|| MISSING_VALUE.to_string()));
        }
        row.push(name);
        row.extend(fields);
        self.rows.insert(key, row);
    }

    fn finish(self) -> Snapshot {
        Snapshot {
            header: self.header,
            rows: self.rows,
        }
    }
}

fn columns(names: &[&str]) -> Vec<HeaderColumn> {
    names.iter().map(|name| HeaderColumn::new(*name)).collect()
}

fn pod_rows(scope: &Scope, pods: Vec<Pod>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::new("READY"),
            HeaderColumn::new("STATUS"),
            HeaderColumn::numeric("RESTARTS"),
            HeaderColumn::new("IP"),
            HeaderColumn::new("NODE"),
            HeaderColumn::new("AGE"),
        ],
    );
    for pod in pods {
        let (ready, total, restarts) = pod.status.as_ref().map(pod_readiness).unwrap_or((0, 0, 0));
        let status = pod_phase(&pod);
        let ip = pod
            .status
            .as_ref()
            .and_then(|status| status.pod_ip.clone())
            .unwrap_or_else(missing);
        let node = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.node_name.clone())
            .unwrap_or_else(missing);
        let age = age_cell(pod.metadata.creation_timestamp.as_ref());
        builder.push(
            pod.namespace(),
            pod.name_any(),
            vec![
                format!("{ready}/{total}"),
                status,
                restarts.to_string(),
                ip,
                node,
                age,
            ],
        );
    }
    builder.finish()
}

fn deployment_rows(scope: &Scope, deployments: Vec<Deployment>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::new("READY"),
            HeaderColumn::numeric("UP-TO-DATE"),
            HeaderColumn::numeric("AVAILABLE"),
            HeaderColumn::new("AGE"),
        ],
    );
    for deployment in deployments {
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let status = deployment.status.as_ref();
        let ready = status.and_then(|status| status.ready_replicas).unwrap_or(0);
        let updated = status
            .and_then(|status| status.updated_replicas)
            .unwrap_or(0);
        let available = status
            .and_then(|status| status.available_replicas)
            .unwrap_or(0);
        let age = age_cell(deployment.metadata.creation_timestamp.as_ref());
        builder.push(
            deployment.namespace(),
            deployment.name_any(),
            vec![
                format!("{ready}/{desired}"),
                updated.to_string(),
                available.to_string(),
                age,
            ],
        );
    }
    builder.finish()
}

fn statefulset_rows(scope: &Scope, statefulsets: Vec<StatefulSet>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::new("READY"),
            HeaderColumn::numeric("CURRENT"),
            HeaderColumn::numeric("UPDATED"),
            HeaderColumn::new("AGE"),
        ],
    );
    for statefulset in statefulsets {
        let desired = statefulset
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let status = statefulset.status.as_ref();
        let ready = status.and_then(|status| status.ready_replicas).unwrap_or(0);
        let current = status
            .and_then(|status| status.current_replicas)
            .unwrap_or(0);
        let updated = status
            .and_then(|status| status.updated_replicas)
            .unwrap_or(0);
        let age = age_cell(statefulset.metadata.creation_timestamp.as_ref());
        builder.push(
            statefulset.namespace(),
            statefulset.name_any(),
            vec![
                format!("{ready}/{desired}"),
                current.to_string(),
                updated.to_string(),
                age,
            ],
        );
    }
    builder.finish()
}

fn daemonset_rows(scope: &Scope, daemonsets: Vec<DaemonSet>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::numeric("DESIRED"),
            HeaderColumn::numeric("CURRENT"),
            HeaderColumn::numeric("READY"),
            HeaderColumn::numeric("UP-TO-DATE"),
            HeaderColumn::numeric("AVAILABLE"),
            HeaderColumn::new("AGE"),
        ],
    );
    for daemonset in daemonsets {
        let status = daemonset.status.as_ref();
        let desired = status
            .map(|status| status.desired_number_scheduled)
            .unwrap_or(0);
        let current = status
            .map(|status| status.current_number_scheduled)
            .unwrap_or(0);
        let ready = status.map(|status| status.number_ready).unwrap_or(0);
        let updated = status
            .and_then(|status| status.updated_number_scheduled)
            .unwrap_or(0);
        let available = status
            .and_then(|status| status.number_available)
            .unwrap_or(0);
        let age = age_cell(daemonset.metadata.creation_timestamp.as_ref());
        builder.push(
            daemonset.namespace(),
            daemonset.name_any(),
            vec![
                desired.to_string(),
                current.to_string(),
                ready.to_string(),
                updated.to_string(),
                available.to_string(),
                age,
            ],
        );
    }
    builder.finish()
}

fn replicaset_rows(scope: &Scope, replicasets: Vec<ReplicaSet>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::numeric("DESIRED"),
            HeaderColumn::numeric("CURRENT"),
            HeaderColumn::numeric("READY"),
            HeaderColumn::new("AGE"),
        ],
    );
    for replicaset in replicasets {
        let desired = replicaset
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1);
        let status = replicaset.status.as_ref();
        let current = status.map(|status| status.replicas).unwrap_or(0);
        let ready = status.and_then(|status| status.ready_replicas).unwrap_or(0);
        let age = age_cell(replicaset.metadata.creation_timestamp.as_ref());
        builder.push(
            replicaset.namespace(),
            replicaset.name_any(),
            vec![
                desired.to_string(),
                current.to_string(),
                ready.to_string(),
                age,
            ],
        );
    }
    builder.finish()
}

fn job_rows(scope: &Scope, jobs: Vec<Job>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::new("COMPLETIONS"),
            HeaderColumn::numeric("ACTIVE"),
            HeaderColumn::numeric("FAILED"),
            HeaderColumn::new("AGE"),
        ],
    );
    for job in jobs {
        let desired = job
            .spec
            .as_ref()
            .and_then(|spec| spec.completions)
            .unwrap_or(1);
        let status = job.status.as_ref();
        let succeeded = status.and_then(|status| status.succeeded).unwrap_or(0);
        let active = status.and_then(|status| status.active).unwrap_or(0);
        let failed = status.and_then(|status| status.failed).unwrap_or(0);
        let age = age_cell(job.metadata.creation_timestamp.as_ref());
        builder.push(
            job.namespace(),
            job.name_any(),
            vec![
                format!("{succeeded}/{desired}"),
                active.to_string(),
                failed.to_string(),
                age,
            ],
        );
    }
    builder.finish()
}

fn cronjob_rows(scope: &Scope, cronjobs: Vec<CronJob>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::new("SCHEDULE"),
            HeaderColumn::new("SUSPEND"),
            HeaderColumn::numeric("ACTIVE"),
            HeaderColumn::new("LAST_SCHEDULE"),
            HeaderColumn::new("AGE"),
        ],
    );
    for cronjob in cronjobs {
        let schedule = cronjob
            .spec
            .as_ref()
            .map(|spec| spec.schedule.clone())
            .unwrap_or_else(missing);
        let suspended = cronjob
            .spec
            .as_ref()
            .and_then(|spec| spec.suspend)
            .unwrap_or(false);
        let active = cronjob
            .status
            .as_ref()
            .and_then(|status| status.active.as_ref())
            .map(|entries| entries.len())
            .unwrap_or(0);
        let last = age_cell(
            cronjob
                .status
                .as_ref()
                .and_then(|status| status.last_schedule_time.as_ref()),
        );
        let age = age_cell(cronjob.metadata.creation_timestamp.as_ref());
        builder.push(
            cronjob.namespace(),
            cronjob.name_any(),
            vec![schedule, suspended.to_string(), active.to_string(), last, age],
        );
    }
    builder.finish()
}

fn service_rows(scope: &Scope, services: Vec<Service>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        columns(&["TYPE", "CLUSTER-IP", "EXTERNAL-IP", "PORTS", "AGE"]),
    );
    for service in services {
        let spec = service.spec.as_ref();
        let service_type = spec
            .and_then(|spec| spec.type_.clone())
            .unwrap_or_else(|| "ClusterIP".to_string());
        let cluster_ip = spec
            .and_then(|spec| spec.cluster_ip.clone())
            .unwrap_or_else(missing);
        let external_ip = service_external_ips(&service);
        let ports = service_ports_summary(&service);
        let age = age_cell(service.metadata.creation_timestamp.as_ref());
        builder.push(
            service.namespace(),
            service.name_any(),
            vec![service_type, cluster_ip, external_ip, ports, age],
        );
    }
    builder.finish()
}

fn configmap_rows(scope: &Scope, configmaps: Vec<ConfigMap>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![HeaderColumn::numeric("DATA"), HeaderColumn::new("AGE")],
    );
    for configmap in configmaps {
        let data = configmap.data.as_ref().map(|entries| entries.len()).unwrap_or(0)
            + configmap
                .binary_data
                .as_ref()
                .map(|entries| entries.len())
                .unwrap_or(0);
        let age = age_cell(configmap.metadata.creation_timestamp.as_ref());
        builder.push(
            configmap.namespace(),
            configmap.name_any(),
            vec![data.to_string(), age],
        );
    }
    builder.finish()
}

fn secret_rows(scope: &Scope, secrets: Vec<Secret>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::new("TYPE"),
            HeaderColumn::numeric("DATA"),
            HeaderColumn::new("AGE"),
        ],
    );
    for secret in secrets {
        let kind = secret.type_.clone().unwrap_or_else(|| "Opaque".to_string());
        let data = secret.data.as_ref().map(|map| map.len()).unwrap_or(0);
        let age = age_cell(secret.metadata.creation_timestamp.as_ref());
        builder.push(
            secret.namespace(),
            secret.name_any(),
            vec![kind, data.to_string(), age],
        );
    }
    builder.finish()
}

fn service_account_rows(scope: &Scope, accounts: Vec<ServiceAccount>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![HeaderColumn::numeric("SECRETS"), HeaderColumn::new("AGE")],
    );
    for account in accounts {
        let secrets = account.secrets.as_ref().map(|items| items.len()).unwrap_or(0);
        let age = age_cell(account.metadata.creation_timestamp.as_ref());
        builder.push(
            account.namespace(),
            account.name_any(),
            vec![secrets.to_string(), age],
        );
    }
    builder.finish()
}

fn pvc_rows(scope: &Scope, claims: Vec<PersistentVolumeClaim>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        columns(&[
            "STATUS",
            "VOLUME",
            "CAPACITY",
            "ACCESS MODES",
            "STORAGECLASS",
            "AGE",
        ]),
    );
    for pvc in claims {
        let spec = pvc.spec.as_ref();
        let status = pvc
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(missing);
        let volume = spec
            .and_then(|spec| spec.volume_name.clone())
            .unwrap_or_else(missing);
        let capacity = pvc
            .status
            .as_ref()
            .and_then(|status| status.capacity.as_ref())
            .and_then(|capacity| capacity.get("storage"))
            .map(|quantity| quantity.0.clone())
            .unwrap_or_else(missing);
        let access = join_or_missing(spec.and_then(|spec| spec.access_modes.as_ref()));
        let class = spec
            .and_then(|spec| spec.storage_class_name.clone())
            .unwrap_or_else(missing);
        let age = age_cell(pvc.metadata.creation_timestamp.as_ref());
        builder.push(
            pvc.namespace(),
            pvc.name_any(),
            vec![status, volume, capacity, access, class, age],
        );
    }
    builder.finish()
}

fn event_rows(scope: &Scope, events: Vec<Event>) -> Snapshot {
    let mut builder = SnapshotBuilder::new(
        scope,
        vec![
            HeaderColumn::new("TYPE"),
            HeaderColumn::new("REASON"),
            HeaderColumn::new("OBJECT"),
            HeaderColumn::numeric("COUNT"),
            HeaderColumn::new("MESSAGE"),
            HeaderColumn::new("AGE"),
        ],
    );
    for event in events {
        let kind = event
            .involved_object
            .kind
            .clone()
            .unwrap_or_else(missing)
            .to_ascii_lowercase();
        let object = event
            .involved_object
            .name
            .clone()
            .unwrap_or_else(missing);
        let event_type = event.type_.clone().unwrap_or_else(missing);
        let reason = event.reason.clone().unwrap_or_else(missing);
        let count = event.count.unwrap_or(1);
        let message = event
            .message
            .as_deref()
            .map(|message| truncate(message.trim(), 80))
            .unwrap_or_else(missing);
        let age = age_cell(event_time(&event));
        builder.push(
            event.namespace(),
            event.name_any(),
            vec![
                event_type,
                reason,
                format!("{kind}/{object}"),
                count.to_string(),
                message,
                age,
            ],
        );
    }
    builder.finish()
}

fn pv_rows(volumes: Vec<PersistentVolume>) -> Snapshot {
    let mut builder = SnapshotBuilder::cluster(columns(&[
        "CAPACITY",
        "ACCESS MODES",
        "RECLAIM POLICY",
        "STATUS",
        "CLAIM",
        "STORAGECLASS",
        "AGE",
    ]));
    for pv in volumes {
        let spec = pv.spec.as_ref();
        let capacity = spec
            .and_then(|spec| spec.capacity.as_ref())
            .and_then(|capacity| capacity.get("storage"))
            .map(|quantity| quantity.0.clone())
            .unwrap_or_else(missing);
        let access = join_or_missing(spec.and_then(|spec| spec.access_modes.as_ref()));
        let reclaim = spec
            .and_then(|spec| spec.persistent_volume_reclaim_policy.clone())
            .unwrap_or_else(missing);
        let status = pv
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(missing);
        let claim = spec
            .and_then(|spec| spec.claim_ref.as_ref())
            .map(|claim| {
                fqn(
                    claim.namespace.as_deref(),
                    claim.name.as_deref().unwrap_or(MISSING_VALUE),
                )
            })
            .unwrap_or_else(missing);
        let class = spec
            .and_then(|spec| spec.storage_class_name.clone())
            .unwrap_or_else(missing);
        let age = age_cell(pv.metadata.creation_timestamp.as_ref());
        builder.push(
            None,
            pv.name_any(),
            vec![capacity, access, reclaim, status, claim, class, age],
        );
    }
    builder.finish()
}

fn node_rows(nodes: Vec<Node>) -> Snapshot {
    let mut builder = SnapshotBuilder::cluster(columns(&[
        "STATUS", "ROLES", "VERSION", "CPU", "MEM", "AGE",
    ]));
    for node in nodes {
        let status = node_status(&node);
        let roles = node_roles(&node);
        let node_status = node.status.as_ref();
        let version = node_status
            .and_then(|status| status.node_info.as_ref())
            .map(|info| info.kubelet_version.clone())
            .unwrap_or_else(missing);
        let allocatable = |resource: &str| {
            node_status
                .and_then(|status| status.allocatable.as_ref())
                .and_then(|allocatable| allocatable.get(resource))
                .map(|quantity| quantity.0.clone())
                .unwrap_or_else(missing)
        };
        let cpu = allocatable("cpu");
        let memory = allocatable("memory");
        let age = age_cell(node.metadata.creation_timestamp.as_ref());
        builder.push(
            None,
            node.name_any(),
            vec![status, roles, version, cpu, memory, age],
        );
    }
    builder.finish()
}

fn namespace_rows(namespaces: Vec<Namespace>) -> Snapshot {
    let mut builder = SnapshotBuilder::cluster(columns(&["STATUS", "AGE"]));
    for namespace in namespaces {
        let phase = namespace
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| "Active".to_string());
        let age = age_cell(namespace.metadata.creation_timestamp.as_ref());
        builder.push(None, namespace.name_any(), vec![phase, age]);
    }
    builder.finish()
}

fn missing() -> String {
    MISSING_VALUE.to_string()
}

fn join_or_missing(values: Option<&Vec<String>>) -> String {
    values
        .map(|values| values.join(","))
        .filter(|joined| !joined.is_empty())
        .unwrap_or_else(missing)
}

fn pod_readiness(status: &PodStatus) -> (usize, usize, i32) {
    let container_statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let total = container_statuses.len();
    let ready = container_statuses
        .iter()
        .filter(|container| container.ready)
        .count();
    let restarts = container_statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();

    (ready, total, restarts)
}

/// Phase refined by deletion and the first waiting/terminated container reason.
fn pod_phase(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }
    let Some(status) = pod.status.as_ref() else {
        return "Unknown".to_string();
    };
    let reason = status
        .container_statuses
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(|container| container.state.as_ref())
        .find_map(|state| {
            state
                .waiting
                .as_ref()
                .and_then(|waiting| waiting.reason.clone())
                .or_else(|| {
                    state
                        .terminated
                        .as_ref()
                        .and_then(|terminated| terminated.reason.clone())
                })
        });
    reason
        .or_else(|| status.reason.clone())
        .or_else(|| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn node_status(node: &Node) -> String {
    let ready = node
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|condition| condition.type_ == "Ready")
        })
        .map(|condition| match condition.status.as_str() {
            "True" => "Ready",
            "False" => "NotReady",
            _ => "Unknown",
        })
        .unwrap_or("Unknown");
    let unschedulable = node
        .spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false);
    if unschedulable {
        format!("{ready},SchedulingDisabled")
    } else {
        ready.to_string()
    }
}

fn node_roles(node: &Node) -> String {
    let Some(labels) = node.metadata.labels.as_ref() else {
        return missing();
    };

    let mut roles = labels
        .keys()
        .filter_map(|key| key.strip_prefix("node-role.kubernetes.io/"))
        .map(|role| {
            if role.is_empty() {
                "worker".to_string()
            } else {
                role.to_string()
            }
        })
        .collect::<Vec<_>>();

    if roles.is_empty()
        && let Some(role) = labels.get("kubernetes.io/role")
    {
        roles.push(role.clone());
    }

    if roles.is_empty() {
        missing()
    } else {
        roles.sort();
        roles.dedup();
        roles.join(",")
    }
}

fn service_external_ips(service: &Service) -> String {
    let mut ips = service
        .spec
        .as_ref()
        .and_then(|spec| spec.external_ips.clone())
        .unwrap_or_default();
    if let Some(ingress) = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|balancer| balancer.ingress.as_ref())
    {
        ips.extend(
            ingress
                .iter()
                .filter_map(|entry| entry.ip.clone().or_else(|| entry.hostname.clone())),
        );
    }
    if ips.is_empty() {
        missing()
    } else {
        ips.join(",")
    }
}

fn service_ports_summary(service: &Service) -> String {
    let ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.clone())
        .unwrap_or_default();
    if ports.is_empty() {
        return missing();
    }

    ports
        .into_iter()
        .map(|port| {
            let protocol = port.protocol.unwrap_or_else(|| "TCP".to_string());
            match port.node_port {
                Some(node_port) => format!("{}:{node_port}/{protocol}", port.port),
                None => format!("{}/{protocol}", port.port),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn event_time(event: &Event) -> Option<&Time> {
    event
        .last_timestamp
        .as_ref()
        .or(event.first_timestamp.as_ref())
        .or(event.metadata.creation_timestamp.as_ref())
}

/// Raw elapsed duration since `timestamp`; humanized later by the table.
fn age_cell(timestamp: Option<&Time>) -> String {
    let Some(timestamp) = timestamp else {
        return missing();
    };
    let elapsed =
        k8s_openapi::jiff::Timestamp::now().as_second() - timestamp.0.as_second();
    format_duration(elapsed.max(0))
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn yaml_detail<T>(value: &T) -> String
where
    T: Serialize,
{
    serde_yaml::to_string(value).unwrap_or_else(|error| format!("failed to format detail: {error}"))
}
